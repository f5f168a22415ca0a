use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 蒙皮配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinningConfig {
    /// 权重表引用了骨架中不存在的骨骼时是否输出警告
    pub warn_missing_bones: bool,

    /// 输入缺少齐次坐标（走较慢路径）时是否记录调试日志
    pub log_unoptimized_input: bool,
}

impl_default!(SkinningConfig {
    warn_missing_bones: true,
    log_unoptimized_input: true,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: SkinningConfig = toml::from_str("log_unoptimized_input = false").unwrap();
        assert!(config.warn_missing_bones);
        assert!(!config.log_unoptimized_input);
    }
}
