use crate::extract::types::{ExtractError, Filter, FilterOp, JsonPath, Segment};

/// 解析 JSONPath 表达式
///
/// 支持的格式：
/// - `$.session.token`
/// - `$.result.data[0].id`、`$.items[-1]`
/// - `$.slots[*].time[0]`、`$.result.*`
/// - `$['content-type']`
/// - `$.result.data[?(@.schedulingType=='ROUND_ROBIN')].id`
/// - `$.result.data[?(@.hidden)]`
pub fn parse_json_path(input: &str) -> Result<JsonPath, ExtractError> {
    let raw = input.trim();
    let invalid = |message: String| ExtractError::InvalidJsonPath {
        path: raw.to_string(),
        message,
    };

    let rest = raw
        .strip_prefix('$')
        .ok_or_else(|| invalid("must start with '$'".to_string()))?;
    let chars: Vec<char> = rest.chars().collect();

    let mut segments = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                if i < chars.len() && chars[i] == '.' {
                    return Err(invalid("recursive descent '..' is not supported".to_string()));
                }
                if i < chars.len() && chars[i] == '*' {
                    segments.push(Segment::Wildcard);
                    i += 1;
                    continue;
                }
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                if start == i {
                    return Err(invalid(format!("empty field name at position {}", start + 1)));
                }
                segments.push(Segment::Child(chars[start..i].iter().collect()));
            }
            '[' => {
                let close = find_closing_bracket(&chars, i)
                    .ok_or_else(|| invalid(format!("unclosed '[' at position {}", i + 1)))?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(inner.trim()).map_err(invalid)?);
                i = close + 1;
            }
            c => {
                return Err(invalid(format!(
                    "unexpected character '{}' at position {}",
                    c,
                    i + 1
                )));
            }
        }
    }

    Ok(JsonPath {
        raw: raw.to_string(),
        segments,
    })
}

/// 查找与 `open` 位置的 '[' 匹配的 ']'，跳过引号与括号内的内容
fn find_closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (offset, &c) in chars[open + 1..].iter().enumerate() {
        let pos = open + 1 + offset;
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ']') if depth == 0 => return Some(pos),
            _ => {}
        }
    }
    None
}

fn parse_bracket(inner: &str) -> Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }

    if let Some(filter) = inner.strip_prefix('?') {
        let filter = filter.trim();
        let body = filter
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| format!("filter must be wrapped in parentheses: {}", inner))?;
        return parse_filter(body.trim()).map(Segment::Filter);
    }

    if let Some(name) = unquote(inner) {
        return Ok(Segment::Child(name.to_string()));
    }

    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| format!("invalid subscript: [{}]", inner))
}

/// 解析过滤条件: `@.a.b == 'x'`、`@.a != 1`、`@.a`
fn parse_filter(expr: &str) -> Result<Filter, String> {
    let (left, condition) = match find_operator(expr) {
        Some((at, op)) => {
            let right = parse_literal(expr[at + 2..].trim())?;
            (expr[..at].trim(), Some((op, right)))
        }
        None => (expr, None),
    };

    let path = left
        .strip_prefix('@')
        .ok_or_else(|| format!("filter must reference the current element '@': {}", expr))?;

    let path = if path.is_empty() {
        Vec::new()
    } else {
        let fields = path
            .strip_prefix('.')
            .ok_or_else(|| format!("invalid filter path: {}", left))?;
        let segments: Vec<String> = fields.split('.').map(|s| s.to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("invalid filter path: {}", left));
        }
        segments
    };

    Ok(Filter { path, condition })
}

/// 找到第一个不在引号内的比较运算符
fn find_operator(expr: &str) -> Option<(usize, FilterOp)> {
    let mut quote: Option<char> = None;
    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None => {
                let rest = &expr[i..];
                if rest.starts_with("==") {
                    return Some((i, FilterOp::Equal));
                }
                if rest.starts_with("!=") {
                    return Some((i, FilterOp::NotEqual));
                }
            }
        }
    }
    None
}

/// 解析过滤条件右值
fn parse_literal(input: &str) -> Result<serde_json::Value, String> {
    if let Some(s) = unquote(input) {
        return Ok(serde_json::Value::String(s.to_string()));
    }

    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(v @ (serde_json::Value::Number(_)
        | serde_json::Value::Bool(_)
        | serde_json::Value::Null)) => Ok(v),
        _ => Err(format!("invalid filter literal: {}", input)),
    }
}

fn unquote(input: &str) -> Option<&str> {
    if input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')))
    {
        Some(&input[1..input.len() - 1])
    } else {
        None
    }
}
