//! 核心宏定义
//!
//! 提供统一的宏来减少配置结构体的样板代码

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```ignore
/// struct SkinningConfig {
///     warn_missing_bones: bool,
///     log_unoptimized_input: bool,
/// }
///
/// impl_default!(SkinningConfig {
///     warn_missing_bones: true,
///     log_unoptimized_input: true,
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct BoneCounter {
        bones: u32,
        name: String,
    }

    impl_default!(BoneCounter {
        bones: 0,
        name: String::from("Skeleton"),
    });

    #[test]
    fn test_impl_default() {
        let counter = BoneCounter::default();
        assert_eq!(counter.bones, 0);
        assert_eq!(counter.name, "Skeleton");
    }
}
