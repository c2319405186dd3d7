use serde::{Deserialize, Serialize};

/// Category实体
///
/// 分类树按嵌套集合模型存储：每个节点持有一对整数边界，
/// 区间包含关系编码祖先关系。同一目录内所有边界构成
/// `1..=2n` 的连续整数集合，无空洞、无重叠。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,

    #[serde(rename = "catalogId")]
    pub catalog_id: i64,

    pub title: String,

    /// 目录内唯一、URL安全
    pub slug: String,

    pub description: Option<String>,

    #[serde(rename = "leftBound")]
    pub left_bound: i64,

    #[serde(rename = "rightBound")]
    pub right_bound: i64,
}

impl Category {
    /// 当前节点是否为other的祖先（严格包含）
    pub fn contains(&self, other: &Category) -> bool {
        self.left_bound < other.left_bound && other.right_bound < self.right_bound
    }

    /// 子树占用的边界数量（叶子为2）
    pub fn span(&self) -> i64 {
        self.right_bound - self.left_bound + 1
    }

    /// 是否为叶子节点
    pub fn is_leaf(&self) -> bool {
        self.right_bound == self.left_bound + 1
    }
}

/// CategoryCount 带层级与计数的分类行
///
/// `total` 由计数器按深度优先序单趟回卷得出：直接计数加上全部后代的计数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    #[serde(rename = "categoryId")]
    pub category_id: i64,

    /// 根节点为0
    pub level: u32,

    /// 直接挂在该分类下的文章数
    pub direct: i64,

    /// 含所有后代的文章总数
    pub total: i64,
}
