use crate::dataset::{ColumnKey, Record};

/// Which edge a column is pinned to while the middle region scrolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixed {
    None,
    Left,
    Right,
}

/// Fixed value lists for the enumerated filters.
pub const SEASONS: &[&str] = &[
    "2022夏", "2022春", "2021夏", "2021春", "2020夏", "2020春", "2019夏", "2019春", "2018夏",
    "2018春", "2017夏", "2017春",
];

pub const ROLES: &[&str] = &["上单", "打野", "中单", "ADC", "辅助"];

/// Filter attached to a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    None,
    /// Multi-select over a fixed value list, exact membership.
    Enumerated(&'static [&'static str]),
    /// Free-text search bound to the shared search session.
    TextSearch,
}

impl FilterKind {
    /// Exact membership test for enumerated filters. Selecting nothing means
    /// the filter is inactive and everything passes.
    pub fn enumerated_matches(selected: &[String], field: Option<&str>) -> bool {
        if selected.is_empty() {
            return true;
        }
        match field {
            Some(v) => selected.iter().any(|s| s == v),
            None => false,
        }
    }
}

/// A renderable data column.
#[derive(Debug, Clone)]
pub struct LeafColumn {
    pub key: ColumnKey,
    pub title: &'static str,
    pub width: usize,
    pub fixed: Fixed,
    pub filter: FilterKind,
}

impl LeafColumn {
    pub fn value(&self, record: &Record) -> Option<String> {
        record.field(self.key)
    }
}

/// Top-level column entry: a plain leaf or a titled group with one level of
/// children. Groups carry no filter behavior of their own.
#[derive(Debug, Clone)]
pub enum ColumnSpec {
    Leaf(LeafColumn),
    Group {
        title: &'static str,
        children: Vec<LeafColumn>,
    },
}

impl ColumnSpec {
    fn leaf(
        key: ColumnKey,
        title: &'static str,
        width: usize,
        fixed: Fixed,
        filter: FilterKind,
    ) -> Self {
        ColumnSpec::Leaf(LeafColumn {
            key,
            title,
            width,
            fixed,
            filter,
        })
    }
}

/// The full column list of the roster table, in display order.
pub fn roster_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::leaf(ColumnKey::Team, "战队名称", 10, Fixed::Left, FilterKind::TextSearch),
        ColumnSpec::leaf(ColumnKey::Name, "选手 ID", 12, Fixed::Left, FilterKind::TextSearch),
        ColumnSpec::leaf(
            ColumnKey::Season,
            "赛季",
            9,
            Fixed::None,
            FilterKind::Enumerated(SEASONS),
        ),
        ColumnSpec::leaf(ColumnKey::Ability, "能力值", 8, Fixed::None, FilterKind::None),
        ColumnSpec::leaf(
            ColumnKey::Role,
            "位置",
            7,
            Fixed::None,
            FilterKind::Enumerated(ROLES),
        ),
        ColumnSpec::leaf(ColumnKey::Skill, "技能", 12, Fixed::None, FilterKind::TextSearch),
        ColumnSpec::Group {
            title: "招牌英雄",
            children: vec![
                LeafColumn {
                    key: ColumnKey::Signature1,
                    title: "招牌英雄 1",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
                LeafColumn {
                    key: ColumnKey::Signature2,
                    title: "招牌英雄 2",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
                LeafColumn {
                    key: ColumnKey::Signature3,
                    title: "招牌英雄 3",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
            ],
        },
        ColumnSpec::Group {
            title: "熟练英雄",
            children: vec![
                LeafColumn {
                    key: ColumnKey::Proficient1,
                    title: "熟练英雄 1",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
                LeafColumn {
                    key: ColumnKey::Proficient2,
                    title: "熟练英雄 2",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
                LeafColumn {
                    key: ColumnKey::Proficient3,
                    title: "熟练英雄 3",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
                LeafColumn {
                    key: ColumnKey::Proficient4,
                    title: "熟练英雄 4",
                    width: 12,
                    fixed: Fixed::None,
                    filter: FilterKind::None,
                },
            ],
        },
        ColumnSpec::Group {
            title: "标签",
            children: vec![
                LeafColumn {
                    key: ColumnKey::Tag1,
                    title: "标签 1",
                    width: 8,
                    fixed: Fixed::Right,
                    filter: FilterKind::TextSearch,
                },
                LeafColumn {
                    key: ColumnKey::Tag2,
                    title: "标签 2",
                    width: 8,
                    fixed: Fixed::Right,
                    filter: FilterKind::TextSearch,
                },
                LeafColumn {
                    key: ColumnKey::Tag3,
                    title: "标签 3",
                    width: 8,
                    fixed: Fixed::Right,
                    filter: FilterKind::TextSearch,
                },
                LeafColumn {
                    key: ColumnKey::Tag4,
                    title: "标签 4",
                    width: 8,
                    fixed: Fixed::Right,
                    filter: FilterKind::TextSearch,
                },
            ],
        },
    ]
}

/// Flatten the spec tree into renderable leaves, tagged with the group title
/// (empty for ungrouped leaves). Display order is preserved.
pub fn flatten(specs: &[ColumnSpec]) -> Vec<(String, LeafColumn)> {
    let mut leaves = Vec::new();
    for spec in specs {
        match spec {
            ColumnSpec::Leaf(leaf) => leaves.push((String::new(), leaf.clone())),
            ColumnSpec::Group { title, children } => {
                for child in children {
                    leaves.push((title.to_string(), child.clone()));
                }
            }
        }
    }
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_roster;

    #[test]
    fn column_order_matches_display_order() {
        let leaves = flatten(&roster_columns());
        let keys: Vec<&str> = leaves.iter().map(|(_, l)| l.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "team",
                "name",
                "season",
                "ability",
                "role",
                "skill",
                "signature1",
                "signature2",
                "signature3",
                "proficient1",
                "proficient2",
                "proficient3",
                "proficient4",
                "tag1",
                "tag2",
                "tag3",
                "tag4"
            ]
        );
    }

    #[test]
    fn frozen_sides() {
        let leaves = flatten(&roster_columns());
        let frozen_left: Vec<&str> = leaves
            .iter()
            .filter(|(_, l)| l.fixed == Fixed::Left)
            .map(|(_, l)| l.key.as_str())
            .collect();
        let frozen_right: Vec<&str> = leaves
            .iter()
            .filter(|(_, l)| l.fixed == Fixed::Right)
            .map(|(_, l)| l.key.as_str())
            .collect();
        assert_eq!(frozen_left, vec!["team", "name"]);
        assert_eq!(frozen_right, vec!["tag1", "tag2", "tag3", "tag4"]);
    }

    #[test]
    fn only_configured_children_are_searchable() {
        let leaves = flatten(&roster_columns());
        let searchable: Vec<&str> = leaves
            .iter()
            .filter(|(_, l)| l.filter == FilterKind::TextSearch)
            .map(|(_, l)| l.key.as_str())
            .collect();
        // The tag children search, the signature/proficient children do not.
        assert_eq!(
            searchable,
            vec!["team", "name", "skill", "tag1", "tag2", "tag3", "tag4"]
        );
    }

    #[test]
    fn group_titles_attach_to_children() {
        let leaves = flatten(&roster_columns());
        let (group, leaf) = leaves
            .iter()
            .find(|(_, l)| l.key == crate::dataset::ColumnKey::Tag2)
            .unwrap();
        assert_eq!(group, "标签");
        assert_eq!(leaf.title, "标签 2");
    }

    #[test]
    fn enumerated_filter_is_exact_membership() {
        let records = parse_roster(
            r#"[{"team": "T1", "name": "Faker", "season": "2022春"}]"#,
        )
        .unwrap();
        let field = records[0].field(crate::dataset::ColumnKey::Season);

        let summer = vec!["2022夏".to_string()];
        let spring = vec!["2022春".to_string()];
        // Substring of the other season label must not match.
        assert!(!FilterKind::enumerated_matches(&summer, field.as_deref()));
        assert!(FilterKind::enumerated_matches(&spring, field.as_deref()));
        // Empty selection filters nothing, missing field fails a selection.
        assert!(FilterKind::enumerated_matches(&[], field.as_deref()));
        assert!(!FilterKind::enumerated_matches(&spring, None));
    }

    #[test]
    fn enumerated_value_lists() {
        assert_eq!(SEASONS.len(), 12);
        assert_eq!(ROLES.len(), 5);
        assert_eq!(SEASONS[0], "2022夏");
        assert!(ROLES.contains(&"ADC"));
    }
}
