use quill_domain::content::CategoryCount;

/// 单趟回卷子树文章总数
///
/// 输入必须是严格深度优先的序列（父节点紧跟其全部后代、然后才是
/// 兄弟节点），顺序是前置条件，这里不做重排。维护一个按层级展开的
/// 祖先栈：节点闭合时把累计值并入上一层。
///
/// 空分类的过滤（匿名/公开视图的"隐藏空分类"）必须在总数算完之后
/// 由调用方执行，计算中途过滤会破坏兄弟层级的累计。
pub fn roll_up(rows: &[(i64, u32, i64)]) -> Vec<CategoryCount> {
    let mut result: Vec<CategoryCount> = rows
        .iter()
        .map(|&(category_id, level, direct)| CategoryCount {
            category_id,
            level,
            direct,
            total: direct,
        })
        .collect();

    // 祖先栈存的是result下标
    let mut stack: Vec<usize> = Vec::new();
    for index in 0..result.len() {
        let level = result[index].level;
        while let Some(&open) = stack.last() {
            if result[open].level >= level {
                stack.pop();
                let closed_total = result[open].total;
                if let Some(&parent) = stack.last() {
                    result[parent].total += closed_total;
                }
            } else {
                break;
            }
        }
        stack.push(index);
    }
    while let Some(open) = stack.pop() {
        let closed_total = result[open].total;
        if let Some(&parent) = stack.last() {
            result[parent].total += closed_total;
        }
    }

    result
}
