pub const NAME: &str = "cohere";

pub const RERANK_PATH: &str = "/v1/rerank";
