use serde_json::{Map, Value};

use super::service::ConfigError;
use super::types::AppConfig;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    validate_optional_string_field(root, "llama_server_binary", "llama_server_binary")?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_u64_field(
            server,
            "server.max_question_length",
            "max_question_length",
            1,
            1_000_000,
        )?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(storage) = expect_optional_object(root, "storage")? {
        validate_optional_string_field(storage, "storage.database_url", "database_url")?;
        validate_optional_string_field(storage, "storage.index_url", "index_url")?;
        validate_u64_field(storage, "storage.max_connections", "max_connections", 1, 256)?;
    }

    if let Some(cache) = expect_optional_object(root, "cache")? {
        validate_bool_field(cache, "cache.use_answer_log", "use_answer_log")?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(
            embedding,
            "embedding.instruction_prefix",
            "instruction_prefix",
        )?;
        validate_u64_field(embedding, "embedding.dimension", "dimension", 1, 65_536)?;
        if let Some(model) = expect_optional_object(embedding, "model")? {
            validate_model_endpoint(model, "embedding.model")?;
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 100)?;
    }

    if let Some(prompt) = expect_optional_object(root, "prompt")? {
        validate_non_empty_string_field(prompt, "prompt.system_prompt", "system_prompt")?;
        validate_optional_string_field(prompt, "prompt.context_header", "context_header")?;
        validate_optional_string_field(prompt, "prompt.question_label", "question_label")?;
    }

    if let Some(generation) = expect_optional_object(root, "generation")? {
        validate_u64_field(
            generation,
            "generation.max_concurrent",
            "max_concurrent",
            1,
            64,
        )?;
        validate_u64_field(
            generation,
            "generation.max_pending",
            "max_pending",
            0,
            10_000,
        )?;
        validate_u64_field(
            generation,
            "generation.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
        if let Some(model) = expect_optional_object(generation, "model")? {
            validate_model_endpoint(model, "generation.model")?;
        }
        if let Some(sampling) = expect_optional_object(generation, "sampling")? {
            validate_u64_field(
                sampling,
                "generation.sampling.max_tokens",
                "max_tokens",
                1,
                131_072,
            )?;
            validate_f64_field(
                sampling,
                "generation.sampling.temperature",
                "temperature",
                0.0,
                5.0,
            )?;
            validate_u64_field(sampling, "generation.sampling.top_k", "top_k", 0, 100_000)?;
            validate_f64_field(sampling, "generation.sampling.top_p", "top_p", 0.0, 1.0)?;
            validate_f64_field(
                sampling,
                "generation.sampling.repeat_penalty",
                "repeat_penalty",
                0.0,
                10.0,
            )?;
            validate_u64_field(sampling, "generation.sampling.seed", "seed", 0, u64::MAX)?;
        }
    }

    Ok(())
}

/// Checks made on the fully resolved configuration, after role defaults and
/// environment overrides have been applied.
pub fn validate_endpoints(config: &AppConfig) -> Result<(), ConfigError> {
    let embedding = &config.embedding.model;
    let generation = &config.generation.model;
    if embedding.base_url.is_none()
        && generation.base_url.is_none()
        && embedding.port == generation.port
    {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at 'embedding.model.port': port {} is also used by generation.model",
            embedding.port
        )));
    }
    Ok(())
}

fn validate_model_endpoint(model: &Map<String, Value>, prefix: &str) -> Result<(), ConfigError> {
    validate_non_empty_string_field(model, &format!("{}.model_id", prefix), "model_id")?;
    validate_optional_string_field(model, &format!("{}.path", prefix), "path")?;
    validate_optional_string_field(model, &format!("{}.base_url", prefix), "base_url")?;
    validate_u64_field(model, &format!("{}.port", prefix), "port", 1, 65535)?;
    validate_u64_field(model, &format!("{}.n_ctx", prefix), "n_ctx", 1, 10_000_000)?;
    validate_u64_field(model, &format!("{}.n_batch", prefix), "n_batch", 1, 1_000_000)?;
    validate_i64_field(
        model,
        &format!("{}.n_gpu_layers", prefix),
        "n_gpu_layers",
        -1,
        1_000_000,
    )?;
    validate_optional_string_field(model, &format!("{}.pooling", prefix), "pooling")?;
    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_i64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: i64,
    max: i64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_i64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn out_of_range<T: std::fmt::Display>(path: &str, min: T, max: T) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': must be between {} and {}",
        path, min, max
    ))
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
