//! 循环游标

/// 单个循环的索引与上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopCursor {
    pub idx: u16,
    pub limit: u16,
}

impl LoopCursor {
    pub const fn new(limit: u16) -> Self {
        Self { idx: 0, limit }
    }

    pub fn reset(&mut self, limit: u16) {
        self.idx = 0;
        self.limit = limit;
    }

    /// 前进一步
    ///
    /// 仍在范围内返回 `true`；越界时回到 0 并返回 `false`。
    pub fn step(&mut self) -> bool {
        self.idx = self.idx.saturating_add(1);
        if self.idx >= self.limit {
            self.idx = 0;
            return false;
        }
        true
    }
}

/// 天线两个轴的游标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AntennaCursor {
    pub axis_a: LoopCursor,
    pub axis_b: LoopCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wraps_at_limit() {
        let mut cursor = LoopCursor::new(3);
        assert!(cursor.step());
        assert!(cursor.step());
        assert_eq!(cursor.idx, 2);
        assert!(!cursor.step());
        assert_eq!(cursor.idx, 0);
    }

    #[test]
    fn test_zero_and_one_limit_never_continue() {
        assert!(!LoopCursor::new(0).step());
        assert!(!LoopCursor::new(1).step());
    }
}
