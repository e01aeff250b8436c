use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::matching::normalize::normalize_label;

/// Canonical label followed by its synonyms.
const GROUPS: &[(&str, &[&str])] = &[
    ("姓名", &["名字", "真实姓名", "用户姓名", "申请人姓名", "full_name", "name"]),
    ("性别", &["gender", "sex"]),
    ("年龄", &["age"]),
    ("身份证号", &["身份证", "身份证号码", "证件号", "证件号码", "id_card", "id_number"]),
    ("手机号", &["电话", "手机", "移动电话", "联系电话", "phone", "mobile", "telephone"]),
    ("邮箱", &["电子邮箱", "电子邮件", "email", "e-mail", "邮件地址"]),
    ("地址", &["联系地址", "现住址", "家庭住址", "address", "location"]),
    ("毕业院校", &["学校", "毕业学校", "就读院校", "university", "school", "college"]),
    ("专业", &["所学专业", "专业名称", "major"]),
    ("学历", &["学历层次", "最高学历", "教育程度", "degree", "education"]),
    ("学位", &["学位类型", "degree"]),
    ("毕业时间", &["毕业年份", "毕业日期", "graduation_time"]),
    ("入学时间", &["入学日期", "开始时间"]),
    ("学号", &["student_id", "student_number"]),
    ("GPA", &["绩点", "平均分", "成绩"]),
    ("公司", &["工作单位", "就职公司", "单位名称", "company"]),
    ("职位", &["岗位", "职务", "工作岗位", "position", "title", "job"]),
    ("工作年限", &["工作经验", "从业年限", "experience_years"]),
    ("薪资", &["工资", "薪酬", "期望薪资", "salary", "wage"]),
    ("到岗时间", &["入职时间", "可到岗时间", "开始工作时间"]),
    ("简历", &["个人简历", "cv", "resume"]),
    ("照片", &["头像", "证件照", "个人照片", "photo", "avatar"]),
    ("备注", &["其他", "补充说明", "additional_info", "remark"]),
    ("技能", &["专业技能", "技能特长", "skills"]),
    ("证书", &["资格证书", "证书名称", "certificate"]),
    ("语言", &["外语水平", "语言能力", "language"]),
    ("项目经验", &["项目", "项目经历", "project"]),
];

/// Read-only lookup from a normalised term to the groups that list it.
pub struct SynonymTable {
    canonicals: Vec<String>,
    /// Group indices per term; the group where the term is canonical
    /// comes first.
    memberships: HashMap<String, Vec<usize>>,
}

impl SynonymTable {
    fn build(groups: &[(&str, &[&str])]) -> Self {
        let mut canonicals = Vec::with_capacity(groups.len());
        let mut memberships: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, (canonical, _)) in groups.iter().enumerate() {
            let key = normalize_label(canonical);
            memberships.entry(key.clone()).or_default().insert(0, idx);
            canonicals.push(key);
        }
        for (idx, (_, synonyms)) in groups.iter().enumerate() {
            for synonym in synonyms.iter() {
                let entry = memberships.entry(normalize_label(synonym)).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
        }
        Self {
            canonicals,
            memberships,
        }
    }

    pub fn global() -> &'static SynonymTable {
        &TABLE
    }

    /// Canonical term for an already normalised label.
    pub fn canonical(&self, term: &str) -> Option<&str> {
        self.memberships
            .get(term)
            .and_then(|groups| groups.first())
            .map(|&idx| self.canonicals[idx].as_str())
    }

    pub fn share_group(&self, a: &str, b: &str) -> bool {
        match (self.memberships.get(a), self.memberships.get(b)) {
            (Some(ga), Some(gb)) => ga.iter().any(|g| gb.contains(g)),
            _ => false,
        }
    }

    /// Scores two normalised labels: 0.95 for the same canonical term,
    /// 0.9 for a shared group, else `None`.
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let (ca, cb) = (self.canonical(a)?, self.canonical(b)?);
        if ca == cb {
            Some(0.95)
        } else if self.share_group(a, b) {
            Some(0.9)
        } else {
            None
        }
    }
}

static TABLE: Lazy<SynonymTable> = Lazy::new(|| SynonymTable::build(GROUPS));
