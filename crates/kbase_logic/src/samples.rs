//! Sample knowledge bases
//!
//! Small, well-known problems used by the CLI `--sample` flag, the tests and
//! the benchmarks. Each one is kept in the text format and parsed on demand.

use crate::store::KnowledgeBase;

const FORWARD_DEMO: &str = "\
# forward chaining: agenda=queue, selection=min reaches X
1\tA^B->C
2\tC->D
3\tE->B
4\tD^E->X
GT = A, E
KL = X
";

const BACKWARD_DEMO: &str = "\
# backward chaining with backtracking on r5 and r3
1\ta^b->c
2\ta->b
3\tc^d->e
4\tb->e
5\tg^e->f
6\tc^e->f
GT = a
KL = f
";

const TRIANGLE: &str = "\
# triangle solving: sides a b c, angles A B C, heights ha hb hc,
# medians ma mb mc, circumradius R, inradius r, area S,
# perimeter P, half perimeter p
1\ta^b^C->c
2\ta^b^ma->c
3\ta^b^mb->c
4\tA^B->C
5\ta^hc->B
6\tb^hc->A
7\ta^R->A
8\tb^R->B
9\ta^b^c->P
10\ta^b^C->p
11\ta^b^C->mc
12\ta^ha->S
13\tA^B^C->S
14\ta^b^c^p->S
15\tb^S->hb
16\tS^p->r
GT = a, b, c
KL = r
";

/// Named sample knowledge bases.
pub struct Samples;

impl Samples {
    /// Names accepted by [`Samples::by_name`].
    pub const NAMES: [&'static str; 3] = ["forward", "backward", "triangle"];

    /// Four rules over `A..E, X`; forward chaining from `{A, E}` reaches `X`.
    pub fn forward_demo() -> KnowledgeBase {
        KnowledgeBase::parse(FORWARD_DEMO)
    }

    /// Six rules over `a..g`; proving `f` from `{a}` needs backtracking.
    pub fn backward_demo() -> KnowledgeBase {
        KnowledgeBase::parse(BACKWARD_DEMO)
    }

    /// Sixteen triangle formulas; `r` is not derivable from the three sides.
    pub fn triangle() -> KnowledgeBase {
        KnowledgeBase::parse(TRIANGLE)
    }

    /// Looks a sample up by name.
    pub fn by_name(name: &str) -> Option<KnowledgeBase> {
        match name.to_ascii_lowercase().as_str() {
            "forward" => Some(Self::forward_demo()),
            "backward" => Some(Self::backward_demo()),
            "triangle" => Some(Self::triangle()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::fact_set;

    #[test]
    fn test_samples_parse_completely() {
        let forward = Samples::forward_demo();
        assert_eq!(forward.rules.len(), 4);
        assert_eq!(forward.facts, fact_set(["A", "E"]));

        let backward = Samples::backward_demo();
        assert_eq!(backward.rules.len(), 6);
        assert_eq!(backward.goals, fact_set(["f"]));

        let triangle = Samples::triangle();
        assert_eq!(triangle.rules.len(), 16);
        assert_eq!(triangle.rules.get(16).unwrap().conclusion, "r");
        assert!(triangle.rules.is_sequential());
    }

    #[test]
    fn test_atoms_are_case_sensitive() {
        let triangle = Samples::triangle();
        let rule = triangle.rules.get(4).unwrap();
        assert_eq!(rule.conclusion, "C");
        assert!(!rule.premises.contains("a"));
    }

    #[test]
    fn test_by_name() {
        for name in Samples::NAMES {
            assert!(Samples::by_name(name).is_some());
        }
        assert!(Samples::by_name("Triangle").is_some());
        assert!(Samples::by_name("nope").is_none());
    }
}
