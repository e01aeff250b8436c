use once_cell::sync::Lazy;

/// Canonical section titles and the heading variants that map to them.
static SECTION_TITLES: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "基本信息",
            vec!["基本信息", "个人信息", "基础信息", "基本资料", "basic information", "personal information", "personal details"],
        ),
        (
            "教育背景",
            vec!["教育背景", "教育经历", "学历信息", "教育信息", "education"],
        ),
        (
            "工作经历",
            vec!["工作经历", "工作经验", "职业经历", "实习经历", "work experience", "employment", "internship"],
        ),
        (
            "技能特长",
            vec!["技能特长", "专业技能", "技能与特长", "技能信息", "skills"],
        ),
        (
            "联系方式",
            vec!["联系方式", "联系信息", "通讯地址", "contact"],
        ),
        (
            "家庭信息",
            vec!["家庭信息", "家庭成员", "家庭背景", "family"],
        ),
        (
            "证书资质",
            vec!["证书资质", "资格证书", "证书信息", "获奖情况", "certificates", "certifications", "awards"],
        ),
        (
            "其他信息",
            vec!["其他信息", "补充信息", "备注", "other information", "additional information"],
        ),
    ]
});

/// Maps a raw heading onto its canonical section title. Unknown headings
/// come back trimmed; blank ones yield `None`.
pub fn normalize_title(raw: &str) -> Option<String> {
    let title = raw.trim();
    if title.is_empty() {
        return None;
    }
    let lowered = title.to_lowercase();
    let canonical = SECTION_TITLES
        .iter()
        .find(|(_, variants)| variants.iter().any(|v| lowered.contains(v)))
        .map(|(canonical, _)| (*canonical).to_string());
    Some(canonical.unwrap_or_else(|| title.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_canonical_titles() {
        assert_eq!(normalize_title(" 教育经历 ").as_deref(), Some("教育背景"));
        assert_eq!(normalize_title("Work Experience (optional)").as_deref(), Some("工作经历"));
        assert_eq!(normalize_title("附加题").as_deref(), Some("附加题"));
        assert_eq!(normalize_title("   "), None);
    }
}
