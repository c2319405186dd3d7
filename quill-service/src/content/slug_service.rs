use chrono::{DateTime, Datelike, Utc};
use quill_api::query::queries;
use quill_api::{CatalogError, Result};
use quill_domain::Catalog;
use quill_infra::{CatalogStore, SlugScope};
use std::cmp::Ordering;
use std::sync::Arc;

/// SlugVars slug模板的替换变量
#[derive(Debug, Clone)]
pub struct SlugVars<'a> {
    pub title: &'a str,
    pub id: i64,
    pub date: DateTime<Utc>,
}

/// SlugAllocator slug分配器
///
/// 从期望值或目录模板导出URL安全的候选，冲突时按数字后缀递增。
/// 给定相同的存储状态，分配是确定且幂等的；并发分配者可能同时
/// 观察到"无冲突"而产出同一个slug，插入时的唯一约束冲突
/// （`SlugConflict`）才是权威信号，调用方据此重试分配。
pub struct SlugAllocator {
    store: Arc<dyn CatalogStore>,
}

impl SlugAllocator {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// 分配一个目录内未占用的slug
    ///
    /// `desired` 为空时用目录模板合成候选；`exclude_id` 指定的行
    /// 不参与冲突判定（更新自身时用）。
    pub async fn allocate(
        &self,
        catalog: &Catalog,
        scope: SlugScope,
        desired: &str,
        vars: &SlugVars<'_>,
        exclude_id: Option<i64>,
    ) -> Result<String> {
        let raw = if desired.trim().is_empty() {
            render_template(&catalog.slug_template, vars)
        } else {
            desired.to_string()
        };
        let candidate = normalize(&raw);
        if candidate.is_empty() {
            return Err(CatalogError::EmptySlug);
        }

        // 常见情形：无冲突，候选原样返回
        let exact = self
            .store
            .list_slugs(
                catalog.id,
                scope,
                &queries::equal("slug", serde_json::json!(candidate)),
                exclude_id,
            )
            .await?;
        if exact.is_empty() {
            return Ok(candidate);
        }

        // 冲突：扫描全部数字后缀变体，取自然序最大者加一
        let pattern = format!("^{}[0-9]+$", regex::escape(&candidate));
        let mut suffixed = self
            .store
            .list_slugs(catalog.id, scope, &queries::matches("slug", pattern), exclude_id)
            .await?;
        if suffixed.is_empty() {
            return Ok(format!("{}2", candidate));
        }
        suffixed.sort_by(|a, b| natural_cmp(a, b));
        let last = suffixed.last().expect("non-empty after check");
        let (prefix, index) = split_trailing_digits(last);
        Ok(format!("{}{}", prefix, index + 1))
    }
}

/// 归一化为URL安全形式：小写ASCII字母数字，其余字符折叠为单个连字符
fn normalize(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// 模板替换，年/月/日按4/2/2位补零
fn render_template(template: &str, vars: &SlugVars<'_>) -> String {
    template
        .replace("{year}", &format!("{:04}", vars.date.year()))
        .replace("{month}", &format!("{:02}", vars.date.month()))
        .replace("{day}", &format!("{:02}", vars.date.day()))
        .replace("{title}", vars.title)
        .replace("{id}", &vars.id.to_string())
}

/// 取尾部数字后缀，无后缀时视为1
fn split_trailing_digits(slug: &str) -> (&str, u64) {
    let digits_start = slug
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    match digits_start {
        Some(start) if start < slug.len() => {
            let index = slug[start..].parse::<u64>().unwrap_or(1);
            (&slug[..start], index)
        }
        _ => (slug, 1),
    }
}

/// 自然序比较：数字段按数值比较，其余按字符比较
///
/// 专用比较器，不依赖区域设置相关的字符串排序。
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(lc), Some(rc)) => {
                if lc.is_ascii_digit() && rc.is_ascii_digit() {
                    let lnum = take_number(&mut left);
                    let rnum = take_number(&mut right);
                    match lnum.cmp(&rnum) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match lc.cmp(&rc) {
                        Ordering::Equal => {
                            left.next();
                            right.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = chars.peek().copied() {
        if let Some(digit) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(digit as u64);
            chars.next();
        } else {
            break;
        }
    }
    value
}
