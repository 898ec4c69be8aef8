//! Default values for the deployed support-desk models and pipeline.

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_QUESTION_LENGTH: usize = 2000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

pub const EMBEDDING_DIMENSION: usize = 1024;
pub const EMBEDDING_MODEL_ID: &str = "Futyn-Maker/wb_questions";
pub const EMBEDDING_PORT: u16 = 8090;
pub const EMBEDDING_N_CTX: u32 = 512;
pub const EMBEDDING_N_BATCH: u32 = 128;
pub const EMBEDDING_POOLING: &str = "mean";
pub const EMBEDDING_INSTRUCTION_PREFIX: &str =
    "Instruct: Given a question, retrieve relevant documents that best answer the question\nQuery: ";

pub const DEFAULT_TOP_K: usize = 5;

pub const GENERATION_MODEL_ID: &str = "saiga_llama3_8b_wildberries_4bit_gguf-unsloth.Q4_K_M.gguf";
pub const GENERATION_PORT: u16 = 8088;
pub const GENERATION_N_CTX: u32 = 8192;
pub const GENERATION_N_BATCH: u32 = 128;
pub const GENERATION_MAX_CONCURRENT: usize = 1;
pub const GENERATION_MAX_PENDING: usize = 16;
pub const GENERATION_TIMEOUT_SECS: u64 = 120;

pub const SAMPLING_MAX_TOKENS: u32 = 1024;
pub const SAMPLING_TEMPERATURE: f32 = 0.6;
pub const SAMPLING_TOP_K: u32 = 30;
pub const SAMPLING_TOP_P: f32 = 0.8;
pub const SAMPLING_REPEAT_PENALTY: f32 = 1.1;
pub const SAMPLING_SEED: u64 = 42;

pub const SYSTEM_PROMPT: &str = "Ты — Помощник, русскоязычный автоматический ассистент. Ты работаешь в технической поддержке компании Wildberries, крупного российского маркетплейса. Ты помогаешь сотрудникам пунктов выдачи заказов (ПВЗ), отвечая на их вопросы. Ответь на вопрос сотрудника ПВЗ, используя вспомогательную информацию из базы знаний. Отвечай последовательно и по существу. Не предоставляй нерелевантную или слишком общую информацию, давай такой ответ, который прямо отвечает на поставленный вопрос, при этом следи, чтобы релевантная информация была передана полностью. Отвечай только на основе вспомогательной информации из базы знаний. Вежливо отказывайся отвечать на вопросы, которые никак не связаны с Wildberries.";
pub const CONTEXT_HEADER: &str = "Вспомогательная информация из базы знаний:";
pub const QUESTION_LABEL: &str = "Вопрос:";
