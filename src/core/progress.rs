//! 进度报告
//!
//! 显式传递的进度句柄。耗时的批处理（构建骨骼、生成权重表）接收一个
//! 可选的 `Progress`，而不是读取全局状态。

/// 进度回调签名，参数范围 `[0.0, 1.0]`
pub type ProgressCallback<'a> = dyn FnMut(f32) + 'a;

/// 分步进度报告器
///
/// ```
/// use character_rig::core::Progress;
///
/// let mut seen = Vec::new();
/// let mut callback = |value: f32| seen.push(value);
/// let mut progress = Progress::new(Some(&mut callback), 2);
/// progress.step();
/// progress.step();
/// drop(progress);
/// assert_eq!(seen, vec![0.5, 1.0]);
/// ```
pub struct Progress<'a> {
    callback: Option<&'a mut ProgressCallback<'a>>,
    steps: usize,
    current: usize,
}

impl<'a> Progress<'a> {
    pub fn new(callback: Option<&'a mut ProgressCallback<'a>>, steps: usize) -> Self {
        Self {
            callback,
            steps,
            current: 0,
        }
    }

    /// 不报告任何进度
    pub fn silent() -> Self {
        Self::new(None, 0)
    }

    /// 前进一步
    pub fn step(&mut self) {
        if self.current < self.steps {
            self.current += 1;
        }
        let value = if self.steps == 0 {
            1.0
        } else {
            self.current as f32 / self.steps as f32
        };
        self.report(value);
    }

    /// 直接报告一个进度值（自动截断到 `[0, 1]`）
    pub fn report(&mut self, value: f32) {
        if let Some(callback) = self.callback.as_mut() {
            callback(value.clamp(0.0, 1.0));
        }
    }

    /// 重新设置总步数，计数归零
    pub fn set_steps(&mut self, steps: usize) {
        self.steps = steps;
        self.current = 0;
    }

    pub fn finish(&mut self) {
        self.current = self.steps;
        self.report(1.0);
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::silent()
    }
}
