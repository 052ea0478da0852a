use crate::Result;
use crate::http::types::Status;
use reqwest::header::HeaderMap as Headers;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Headers,
    pub body: String,
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: String, duration: Duration) -> Result<Self> {
        Ok(Self {
            status: Status::new(status)?,
            headers,
            body,
            duration,
        })
    }

    /// 将响应头拼接为 `name: value` 文本块，供正则提取使用
    ///
    /// 同名 header 会各占一行，保持接收顺序
    pub fn header_block(&self) -> String {
        self.headers
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}: {}",
                    name.as_str(),
                    value.to_str().unwrap_or("<invalid utf-8>")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 将响应头转换为 JSON 对象（小写 header 名 -> 值），供 JSONPath 提取使用
    ///
    /// 同名 header 只保留第一个值
    pub fn headers_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in self.headers.iter() {
            if map.contains_key(name.as_str()) {
                continue;
            }
            if let Ok(v) = value.to_str() {
                map.insert(
                    name.as_str().to_string(),
                    serde_json::Value::String(v.to_string()),
                );
            }
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_headers() -> Response {
        let mut headers = Headers::new();
        headers.append("set-cookie", "session=abc; Path=/".parse().unwrap());
        headers.append("set-cookie", "csrf=xyz; Path=/".parse().unwrap());
        headers.insert("x-trace-id", "trace-1".parse().unwrap());
        Response::new(200, headers, String::new(), Duration::from_millis(5)).unwrap()
    }

    #[test]
    fn test_header_block_keeps_repeated_headers() {
        let block = response_with_headers().header_block();
        assert!(block.contains("set-cookie: session=abc; Path=/"));
        assert!(block.contains("set-cookie: csrf=xyz; Path=/"));
        assert!(block.contains("x-trace-id: trace-1"));
    }

    #[test]
    fn test_headers_json_first_value_wins() {
        let json = response_with_headers().headers_json();
        assert_eq!(json["set-cookie"], "session=abc; Path=/");
        assert_eq!(json["x-trace-id"], "trace-1");
    }

    #[test]
    fn test_invalid_status() {
        assert!(Response::new(999, Headers::new(), String::new(), Duration::ZERO).is_err());
    }
}
