use serde::{Deserialize, Serialize};

/// CategorySelector 分类过滤令牌指向的目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySelector {
    /// 按分类id
    Id(i64),
    /// 按分类slug
    Slug(String),
    /// "null"或空令牌：匹配未归类内容
    Uncategorized,
}

/// CategoryToken 带修饰符的分类过滤令牌
///
/// 松散输入形如 `12`、`news?sub`、`3?not`、`7?sub?not`、`null`，
/// 修饰符顺序不限。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryToken {
    pub selector: CategorySelector,

    /// `?sub`：扩展为该分类及其全部后代
    pub subtree: bool,

    /// `?not`：排除
    pub negate: bool,
}

impl CategoryToken {
    /// 解析一个松散令牌
    pub fn parse(raw: &str) -> Self {
        let mut subtree = false;
        let mut negate = false;
        let mut parts = raw.split('?');
        let base = parts.next().unwrap_or("").trim();
        for modifier in parts {
            match modifier.trim() {
                "sub" => subtree = true,
                "not" => negate = true,
                _ => {}
            }
        }

        let selector = if base.is_empty() || base.eq_ignore_ascii_case("null") {
            CategorySelector::Uncategorized
        } else if let Ok(id) = base.parse::<i64>() {
            CategorySelector::Id(id)
        } else {
            CategorySelector::Slug(base.to_string())
        };

        Self {
            selector,
            subtree,
            negate,
        }
    }
}

/// FilterParams 调用方提交的松散参数包
///
/// 全部字段可缺省，数值以字符串形式到达，由归一化负责清洗。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub ids: Vec<String>,

    #[serde(rename = "excludeIds", default)]
    pub exclude_ids: Vec<String>,

    /// 分类令牌，见 [`CategoryToken::parse`]
    #[serde(default)]
    pub categories: Vec<String>,

    pub year: Option<String>,
    pub month: Option<String>,
    pub day: Option<String>,

    pub language: Option<String>,

    /// 空白分隔的检索串
    pub search: Option<String>,

    /// 内容类型标签，缺省为"post"
    pub kind: Option<String>,
}

/// FilterCriteria 归一化后的谓词集合
///
/// 不落库；编译为 Condition 之前的中间形态，目录作用域显式携带。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(rename = "catalogId")]
    pub catalog_id: i64,

    pub ids: Vec<i64>,

    #[serde(rename = "excludeIds")]
    pub exclude_ids: Vec<i64>,

    pub categories: Vec<CategoryToken>,

    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,

    pub language: Option<String>,

    /// 清洗后的检索词：小写、仅字母数字、长度达标
    pub words: Vec<String>,

    pub kind: Option<String>,
}

impl FilterCriteria {
    /// 空条件集
    pub fn for_catalog(catalog_id: i64) -> Self {
        Self {
            catalog_id,
            ids: Vec::new(),
            exclude_ids: Vec::new(),
            categories: Vec::new(),
            year: None,
            month: None,
            day: None,
            language: None,
            words: Vec::new(),
            kind: None,
        }
    }

    /// 从松散参数包归一化
    ///
    /// 非数字的id静默丢弃；检索词按空白切分、去除非字母数字字符、
    /// 转小写，短于 `min_word_len` 的丢弃。
    pub fn from_params(catalog_id: i64, params: &FilterParams, min_word_len: usize) -> Self {
        let ids = parse_ids(&params.ids);
        let exclude_ids = parse_ids(&params.exclude_ids);
        let categories = params
            .categories
            .iter()
            .map(|raw| CategoryToken::parse(raw))
            .collect();

        let words = params
            .search
            .as_deref()
            .map(|s| tokenize(s, min_word_len))
            .unwrap_or_default();

        Self {
            catalog_id,
            ids,
            exclude_ids,
            categories,
            year: params.year.as_deref().and_then(|v| v.trim().parse().ok()),
            month: params.month.as_deref().and_then(|v| v.trim().parse().ok()),
            day: params.day.as_deref().and_then(|v| v.trim().parse().ok()),
            language: params.language.clone().filter(|l| !l.is_empty()),
            words,
            kind: params.kind.clone().filter(|k| !k.is_empty()),
        }
    }
}

fn parse_ids(raw: &[String]) -> Vec<i64> {
    raw.iter()
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .collect()
}

/// 检索串分词：空白切分、剥离非字母数字字符、转小写、按最小词长过滤
fn tokenize(input: &str, min_word_len: usize) -> Vec<String> {
    input
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| word.len() >= min_word_len)
        .collect()
}
