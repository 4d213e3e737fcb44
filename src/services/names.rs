use rand::Rng;
use rand::seq::IndexedRandom;

const SURNAMES: &[&str] = &[
    "李", "王", "张", "刘", "陈", "杨", "赵", "黄", "周", "吴", "徐", "孙", "胡", "朱", "高",
    "林", "何", "郭", "马", "罗", "梁", "宋", "郑", "谢", "韩", "唐", "冯", "于", "董", "萧",
    "欧阳", "上官", "慕容", "司马",
];

const GIVEN: &[&str] = &[
    "云", "风", "辰", "逸", "轩", "宇", "浩", "然", "婉", "清", "若", "雪", "瑶", "琳", "晨",
    "天", "明", "志", "远", "凌", "霜", "月", "星", "楠", "子", "文", "静", "思", "涵", "墨",
];

const ROLES: &[&str] = &["主角", "配角", "反派", "导师"];

const TRANSITIONS: &[&str] = &["三年后", "与此同时", "次日清晨", "转眼间"];

#[derive(Debug, Default, Clone, Copy)]
pub struct NameGenerator;

impl NameGenerator {
    pub fn new() -> Self {
        Self
    }

    /// A surname followed by one or two given-name characters.
    pub fn name<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut name = SURNAMES.choose(rng).copied().unwrap_or("李").to_string();
        let given_len = rng.random_range(1..=2);
        for _ in 0..given_len {
            name.push_str(GIVEN.choose(rng).copied().unwrap_or("云"));
        }
        name
    }

    /// `count` names, each tagged with a role, e.g. `林逸（主角）`.
    pub fn characters<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<String> {
        (0..count)
            .map(|_| {
                let name = self.name(rng);
                let role = ROLES.choose(rng).copied().unwrap_or(ROLES[0]);
                format!("{name}（{role}）")
            })
            .collect()
    }

    /// `count` distinct transition phrases.
    pub fn transitions<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<String> {
        TRANSITIONS
            .choose_multiple(rng, count)
            .map(|t| t.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_characters_carry_roles() {
        let mut rng = StdRng::seed_from_u64(1);
        let characters = NameGenerator::new().characters(&mut rng, 3);
        assert_eq!(characters.len(), 3);
        for c in &characters {
            assert!(ROLES.iter().any(|r| c.ends_with(&format!("（{r}）"))));
        }
    }

    #[test]
    fn test_same_seed_same_names() {
        let names = NameGenerator::new();
        let a = names.characters(&mut StdRng::seed_from_u64(42), 5);
        let b = names.characters(&mut StdRng::seed_from_u64(42), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_transitions_are_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = NameGenerator::new().transitions(&mut rng, 2);
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
    }
}
