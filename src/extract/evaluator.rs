use crate::extract::types::{Filter, FilterOp, JsonPath, Segment};
use serde_json::Value;

impl JsonPath {
    /// 在 JSON 文档上求值，按文档顺序返回所有匹配节点
    pub fn evaluate<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Child(name) => {
                        if let Some(child) = value.as_object().and_then(|map| map.get(name)) {
                            next.push(child);
                        }
                    }
                    Segment::Index(index) => {
                        if let Some(child) = value.as_array().and_then(|items| at(items, *index)) {
                            next.push(child);
                        }
                    }
                    Segment::Wildcard => next.extend(children(value)),
                    Segment::Filter(filter) => {
                        next.extend(children(value).filter(|item| filter.matches(item)));
                    }
                }
            }
            current = next;
        }

        current
    }

    /// 返回第一个匹配节点
    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.evaluate(root).into_iter().next()
    }
}

fn at(items: &[Value], index: i64) -> Option<&Value> {
    let resolved = if index < 0 {
        items.len() as i64 + index
    } else {
        index
    };
    usize::try_from(resolved).ok().and_then(|i| items.get(i))
}

fn children(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

impl Filter {
    fn matches(&self, item: &Value) -> bool {
        let mut target = item;
        for field in &self.path {
            match target.as_object().and_then(|map| map.get(field)) {
                Some(v) => target = v,
                None => return false,
            }
        }

        match &self.condition {
            None => true,
            Some((FilterOp::Equal, expected)) => values_equal(target, expected),
            Some((FilterOp::NotEqual, expected)) => !values_equal(target, expected),
        }
    }
}

/// 数字按数值比较（1 与 1.0 相等），其余按 JSON 结构比较
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}
