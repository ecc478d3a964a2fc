// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）、英文、越南语
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 3] = ["zh-CN", "en", "vi"];

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" / "en" / "vi"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 语言代码是否受支持
pub fn is_supported(locale: &str) -> bool {
    SUPPORTED_LOCALES.contains(&locale)
}

/// 翻译消息（无参数，使用全局语言）
///
/// # 示例
/// ```no_run
/// use farm_capacity_ledger::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数，使用全局语言）
///
/// # 示例
/// ```no_run
/// use farm_capacity_ledger::i18n::t_with_args;
/// let msg = t_with_args("capacity.barn_not_found", &[("area", "Khu Z")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    fill_args(rust_i18n::t!(key).to_string(), args)
}

/// 翻译消息（带参数，指定语言，不修改全局状态）
pub fn t_with_args_in(locale: &str, key: &str, args: &[(&str, &str)]) -> String {
    fill_args(rust_i18n::t!(key, locale = locale).to_string(), args)
}

fn fill_args(mut result: String, args: &[(&str, &str)]) -> String {
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // rust-i18n 的 locale 为全局状态，测试并行执行时需要串行化
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(current_locale(), "en");
        assert_eq!(t("common.success"), "Operation successful");

        set_locale("zh-CN");
        assert_eq!(current_locale(), "zh-CN");
        assert_eq!(t("common.success"), "操作成功");
    }

    #[test]
    fn test_translate_with_explicit_locale() {
        let args = [
            ("area", "Khu A"),
            ("requested", "800"),
            ("remaining", "700"),
            ("max", "1000"),
        ];

        let vi = t_with_args_in("vi", "capacity.admission_rejected", &args);
        assert!(vi.contains("Khu A"));
        assert!(vi.contains("800"));
        assert!(vi.contains("không đủ sức chứa"));

        let zh = t_with_args_in("zh-CN", "capacity.admission_rejected", &args);
        assert!(zh.contains("剩余容量不足"));
        assert!(zh.contains("700"));
    }

    #[test]
    fn test_supported_locales() {
        assert!(is_supported("vi"));
        assert!(!is_supported("fr"));
    }
}
