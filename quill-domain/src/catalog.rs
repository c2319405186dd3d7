use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog实体（单个博客，即分类、文章、评论和slug的命名空间）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: i64,

    pub title: String,

    /// 目录级的"最后修改"时间戳，本子系统的每次变更都会更新它，
    /// 前端渲染以此作为缓存失效信号
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,

    /// 是否允许匿名访客看到带密码保护的已发布内容
    #[serde(rename = "showPassworded", default)]
    pub show_passworded: bool,

    /// slug生成模板，支持 {year} {month} {day} {title} {id} 变量
    #[serde(rename = "slugTemplate", default = "default_slug_template")]
    pub slug_template: String,

    /// 全文检索的最小词长，短于该长度的词被丢弃
    #[serde(rename = "minSearchWordLen", default = "default_min_word_len")]
    pub min_search_word_len: usize,
}

fn default_slug_template() -> String {
    "{title}".to_string()
}

fn default_min_word_len() -> usize {
    3
}

impl Catalog {
    pub fn new(id: i64, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            updated_at: created_at,
            show_passworded: false,
            slug_template: default_slug_template(),
            min_search_word_len: default_min_word_len(),
        }
    }
}
