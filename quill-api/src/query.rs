use serde::{Deserialize, Serialize};

/// DatePart 表示时间戳的日期部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

/// Condition 表示查询条件
///
/// 由过滤器编译产出、交给存储实现翻译执行的谓词树。
/// 字段名使用实体序列化后的路径（如 `categoryId`、`publishedAt`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    /// 空条件（匹配所有）
    Empty,

    /// AND条件
    And {
        left: Box<Condition>,
        right: Box<Condition>,
    },

    /// OR条件
    Or {
        left: Box<Condition>,
        right: Box<Condition>,
    },

    /// NOT条件
    Not { condition: Box<Condition> },

    /// 等于条件
    Equal {
        field: String,
        value: serde_json::Value,
    },

    /// 不等于条件
    NotEqual {
        field: String,
        value: serde_json::Value,
    },

    /// IN条件
    In {
        field: String,
        values: Vec<serde_json::Value>,
    },

    /// NOT IN条件
    NotIn {
        field: String,
        values: Vec<serde_json::Value>,
    },

    /// IS NULL条件
    IsNull { field: String },

    /// IS NOT NULL条件
    IsNotNull { field: String },

    /// 子串包含条件（区分大小写，调用方负责统一大小写）
    Contains { field: String, value: String },

    /// 正则匹配条件
    ///
    /// 不支持正则的存储实现可以退化为转义后的前缀LIKE扫描再行过滤。
    Matches { field: String, pattern: String },

    /// 日期部分相等条件（按存储引擎的日期抽取实现，内存实现解析RFC3339）
    DatePartEquals {
        field: String,
        part: DatePart,
        value: u32,
    },
}

impl Condition {
    /// 创建空条件
    pub fn empty() -> Self {
        Self::Empty
    }

    /// AND组合，空条件被吸收
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::Empty, other) => other,
            (cond, Condition::Empty) => cond,
            (left, right) => Condition::And {
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// OR组合
    pub fn or(self, other: Condition) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// NOT取反
    pub fn not(self) -> Self {
        Self::Not {
            condition: Box::new(self),
        }
    }
}

/// Sort 表示排序要求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::descending("publishedAt")
    }
}

/// Queries 提供查询构建工具函数
pub mod queries {
    use super::{Condition, DatePart};
    use serde_json::Value;

    /// 创建等于条件
    pub fn equal(field: impl Into<String>, value: Value) -> Condition {
        Condition::Equal {
            field: field.into(),
            value,
        }
    }

    /// 创建不等于条件
    pub fn not_equal(field: impl Into<String>, value: Value) -> Condition {
        Condition::NotEqual {
            field: field.into(),
            value,
        }
    }

    /// 创建IN条件，单元素退化为等于
    pub fn in_condition(field: impl Into<String>, values: Vec<Value>) -> Condition {
        if values.len() == 1 {
            equal(field, values.into_iter().next().unwrap())
        } else {
            Condition::In {
                field: field.into(),
                values,
            }
        }
    }

    /// 创建NOT IN条件
    pub fn not_in(field: impl Into<String>, values: Vec<Value>) -> Condition {
        Condition::NotIn {
            field: field.into(),
            values,
        }
    }

    /// 创建IS NULL条件
    pub fn is_null(field: impl Into<String>) -> Condition {
        Condition::IsNull {
            field: field.into(),
        }
    }

    /// 创建IS NOT NULL条件
    pub fn is_not_null(field: impl Into<String>) -> Condition {
        Condition::IsNotNull {
            field: field.into(),
        }
    }

    /// 创建子串包含条件
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Condition {
        Condition::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// 创建正则匹配条件
    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Condition {
        Condition::Matches {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// 创建日期部分相等条件
    pub fn date_part(field: impl Into<String>, part: DatePart, value: u32) -> Condition {
        Condition::DatePartEquals {
            field: field.into(),
            part,
            value,
        }
    }
}
