use chrono::{DateTime, Utc};
use quill_api::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// CommentStatus表示评论的状态
///
/// 线上存储为有符号整数：Junk=-2、Pending=-1、Unpublished=0、Published=1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum CommentStatus {
    Junk,
    Pending,
    Unpublished,
    Published,
}

impl From<CommentStatus> for i8 {
    fn from(status: CommentStatus) -> i8 {
        match status {
            CommentStatus::Junk => -2,
            CommentStatus::Pending => -1,
            CommentStatus::Unpublished => 0,
            CommentStatus::Published => 1,
        }
    }
}

impl TryFrom<i8> for CommentStatus {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, String> {
        match value {
            -2 => Ok(CommentStatus::Junk),
            -1 => Ok(CommentStatus::Pending),
            0 => Ok(CommentStatus::Unpublished),
            1 => Ok(CommentStatus::Published),
            other => Err(format!("unknown comment status: {}", other)),
        }
    }
}

/// CommentAuthor 评论作者输入（校验后才进入实体）
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct CommentAuthor {
    #[validate(length(min = 1, message = "author name is required"))]
    pub name: String,

    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,

    #[validate(url(message = "invalid url"))]
    pub url: Option<String>,
}

impl CommentAuthor {
    /// 执行字段校验，失败转换为统一的Validation错误
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;
        Ok(self)
    }
}

/// Comment实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,

    #[serde(rename = "postId")]
    pub post_id: i64,

    /// 冗余存储所属目录，保证评论只引用同目录的文章
    #[serde(rename = "catalogId")]
    pub catalog_id: i64,

    pub status: CommentStatus,

    #[serde(rename = "isTrackback")]
    pub is_trackback: bool,

    #[serde(rename = "authorName")]
    pub author_name: String,

    #[serde(rename = "authorEmail")]
    pub author_email: Option<String>,

    #[serde(rename = "authorUrl")]
    pub author_url: Option<String>,

    pub content: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    pub ip: Option<String>,
}

impl Comment {
    pub fn is_published(&self) -> bool {
        self.status == CommentStatus::Published
    }
}
