/// 提取模块 - 从响应 body/header 中按 JSONPath 或正则提取关联值
mod evaluator;
mod extractor;
mod parser;
mod types;

pub use extractor::extract_value;
pub use parser::parse_json_path;
pub use types::{
    ExtractError, ExtractSource, Expression, Filter, FilterOp, JsonPath, RegexPattern, Segment,
};
