use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PostStatus表示文章的发布状态
///
/// 线上存储为有符号整数：Pending=-2、Scheduled=-1、Unpublished=0、Published=1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum PostStatus {
    Pending,
    Scheduled,
    Unpublished,
    Published,
}

impl From<PostStatus> for i8 {
    fn from(status: PostStatus) -> i8 {
        match status {
            PostStatus::Pending => -2,
            PostStatus::Scheduled => -1,
            PostStatus::Unpublished => 0,
            PostStatus::Published => 1,
        }
    }
}

impl TryFrom<i8> for PostStatus {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -2 => Ok(PostStatus::Pending),
            -1 => Ok(PostStatus::Scheduled),
            0 => Ok(PostStatus::Unpublished),
            1 => Ok(PostStatus::Published),
            other => Err(format!("unknown post status: {}", other)),
        }
    }
}

/// Post实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,

    #[serde(rename = "catalogId")]
    pub catalog_id: i64,

    #[serde(rename = "authorId")]
    pub author_id: i64,

    /// 为None表示未归类
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,

    pub status: PostStatus,

    pub title: String,

    /// 目录内唯一
    pub slug: String,

    pub body: String,

    /// 预计算的分词索引列，全文检索的子串谓词作用于此
    #[serde(rename = "wordIndex")]
    pub word_index: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,

    /// 发布（或计划发布）时刻，按作者时区的墙上时间记录
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,

    /// 与UTC的偏移（分钟），定时发布扫描用它换算墙上时间
    #[serde(rename = "utcOffsetMinutes")]
    pub utc_offset_minutes: i32,

    pub language: String,

    /// 非空时内容受密码保护，影响匿名可见性
    pub password: Option<String>,

    /// 单向标志：首次进入Published时置真，之后永不回退
    #[serde(rename = "firstPublished")]
    pub first_published: bool,

    /// 已发布的非trackback评论数，派生计数
    #[serde(rename = "commentCount")]
    pub comment_count: i64,

    /// 已发布的trackback数，派生计数
    #[serde(rename = "trackbackCount")]
    pub trackback_count: i64,

    /// 自由内容类型标签，默认"post"
    pub kind: String,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}
