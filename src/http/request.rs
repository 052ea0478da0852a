use reqwest::header::{CONTENT_TYPE, HeaderMap as Headers, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::http::types::Method;
use crate::{Result, RuscenarioError};

/// 已渲染完成、可直接发送的请求
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| RuscenarioError::InvalidUrl(format!("{} ({})", url, e)))?;
        Ok(Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
        })
    }

    fn insert_header(&mut self, key: &str, value: &str) -> Result<()> {
        let header_name: HeaderName = key
            .parse()
            .map_err(|_| RuscenarioError::ParseError(format!("Invalid header name: {}", key)))?;
        let header_value: HeaderValue = value.parse().map_err(|_| {
            RuscenarioError::ParseError(format!("Invalid value for header {}: {}", key, value))
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self> {
        self.insert_header(key, value)?;
        Ok(self)
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.body = Some(text.to_owned());
        self
    }

    /// 序列化为 JSON body；未显式设置 Content-Type 时补上 application/json
    pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
        let json = serde_json::to_string(data)?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.insert_header("Content-Type", "application/json")?;
        }
        self.body = Some(json);
        Ok(self)
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }
}
