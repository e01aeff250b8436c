use once_cell::sync::Lazy;

use crate::matching::normalize::normalize_label;

/// Coarse semantic categories keyed by label keywords. The first category
/// with a keyword contained in the normalised label wins.
static CATEGORIES: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "education",
            vec![
                "学校", "院校", "大学", "学院", "专业", "学历", "学位", "毕业", "入学", "学号", "gpa",
                "绩点", "school", "college", "university", "major", "degree", "education",
            ],
        ),
        (
            "work_experience",
            vec![
                "公司", "单位", "职位", "岗位", "部门", "薪资", "工资", "入职", "离职", "工作",
                "company", "employer", "position", "salary", "job",
            ],
        ),
        (
            "contact",
            vec!["手机", "电话", "邮箱", "邮件", "地址", "邮编", "phone", "mobile", "email", "address"],
        ),
        (
            "basic_info",
            vec![
                "姓名", "性别", "年龄", "出生", "生日", "民族", "籍贯", "身份证", "政治面貌", "婚姻",
                "name", "gender", "birth",
            ],
        ),
        (
            "skills",
            vec!["技能", "特长", "语言", "外语", "skill", "language"],
        ),
        (
            "certificates",
            vec!["证书", "获奖", "奖项", "资格", "certificate", "award"],
        ),
        (
            "family",
            vec!["家庭", "父亲", "母亲", "配偶", "亲属", "关系", "family", "relation"],
        ),
    ]
});

pub fn classify_label(label: &str) -> Option<&'static str> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_labels() {
        assert_eq!(classify_label("毕业院校"), Some("education"));
        assert_eq!(classify_label("所在公司"), Some("work_experience"));
        assert_eq!(classify_label("联系电话"), Some("contact"));
        assert_eq!(classify_label("姓名"), Some("basic_info"));
        assert_eq!(classify_label("Email Address"), Some("contact"));
        assert_eq!(classify_label("起止时间"), None);
    }
}
