use crate::{
    canonical::canonical_name,
    rules::{ProductFamilies, RuleDefinition, RuleKind, RuleTable, SeriesPlan},
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

const DEFAULT_RULES: &str = include_str!("../rules/vaccine_rules.ron");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("rule table is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("rule key {0:?} is defined more than once")]
    DuplicateKey(String),
    #[error("{context} refers to unknown rule {key:?}")]
    UnknownRule { context: String, key: String },
    #[error("rule {rule:?} has no course named {course:?}")]
    UnknownCourse { rule: String, course: String },
    #[error("rule {rule:?} has no member line named {member:?}")]
    UnknownMember { rule: String, member: String },
    #[error("rule {rule:?}: the first interval of {plan} must be empty")]
    LeadingInterval { rule: String, plan: String },
}

/// A rule definition together with its precomputed canonical name sets.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    definition: RuleDefinition,
    names: BTreeSet<String>,
    course_names: Vec<BTreeSet<String>>,
    member_names: BTreeMap<String, BTreeSet<String>>,
}

impl CompiledRule {
    fn compile(definition: RuleDefinition) -> Self {
        let canonical_set =
            |raw: &[String]| raw.iter().map(|name| canonical_name(name)).collect::<BTreeSet<_>>();

        let mut names = canonical_set(&definition.names);
        let course_names = match &definition.kind {
            RuleKind::Courses(group) => group.courses.iter().map(|c| canonical_set(&c.names)).collect(),
            RuleKind::AgeRangeCourses(group) => {
                group.courses.iter().map(|c| canonical_set(&c.names)).collect()
            }
            _ => Vec::new(),
        };
        let member_names = match &definition.kind {
            RuleKind::Equivalence(group) => group
                .members
                .iter()
                .map(|(member, raw)| (member.clone(), canonical_set(raw)))
                .collect(),
            _ => BTreeMap::new(),
        };
        for set in course_names.iter().chain(member_names.values()) {
            names.extend(set.iter().cloned());
        }

        Self {
            definition,
            names,
            course_names,
            member_names,
        }
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn display(&self) -> &str {
        &self.definition.display
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    pub fn kind(&self) -> &RuleKind {
        &self.definition.kind
    }

    pub fn is_live(&self) -> bool {
        self.definition.live
    }

    /// Every canonical name this rule claims, including its courses and members.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn course_names(&self, index: usize) -> Option<&BTreeSet<String>> {
        self.course_names.get(index)
    }

    pub fn member_names(&self, member: &str) -> Option<&BTreeSet<String>> {
        self.member_names.get(member)
    }

    // True if `canonical` belongs to this rule and the rule or its matching course is live.
    fn marks_live(&self, canonical: &str) -> bool {
        if self.definition.live && self.names.contains(canonical) {
            return true;
        }
        let courses = match &self.definition.kind {
            RuleKind::Courses(group) => &group.courses,
            RuleKind::AgeRangeCourses(group) => &group.courses,
            _ => return false,
        };
        courses
            .iter()
            .zip(&self.course_names)
            .any(|(course, names)| course.live && names.contains(canonical))
    }

    fn plans(&self) -> Vec<(String, &SeriesPlan)> {
        match &self.definition.kind {
            RuleKind::SingleSeries(plan) => vec![("the series".to_owned(), plan)],
            RuleKind::AgeBanded(banded) => banded
                .bands
                .iter()
                .enumerate()
                .map(|(i, band)| (format!("band {}", i + 1), &band.plan))
                .collect(),
            RuleKind::Courses(group) => group
                .courses
                .iter()
                .map(|course| (format!("course {:?}", course.display), &course.plan))
                .collect(),
            RuleKind::AgeRangeCourses(group) => group
                .courses
                .iter()
                .map(|course| (format!("course {:?}", course.display), &course.plan))
                .collect(),
            RuleKind::Equivalence(group) => group
                .regimens
                .iter()
                .enumerate()
                .map(|(i, regimen)| (format!("regimen {}", i + 1), &regimen.plan))
                .collect(),
            RuleKind::SingleDose(_) | RuleKind::Cumulative(_) | RuleKind::Seasonal(_) => Vec::new(),
        }
    }
}

/// Immutable rule registry, built once and shared by reference across evaluations.
#[derive(Clone, Debug)]
pub struct Registry {
    version: String,
    rules: Vec<CompiledRule>,
    standard_vaccines: Vec<String>,
    pneumococcal: Option<ProductFamilies>,
}

impl Registry {
    pub fn from_ron_str(text: &str) -> Result<Self, RegistryError> {
        let table: RuleTable = ron::from_str(text)?;
        Self::from_table(table)
    }

    pub fn from_table(table: RuleTable) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for rule in &table.rules {
            if !seen.insert(rule.key.as_str()) {
                return Err(RegistryError::DuplicateKey(rule.key.clone()));
            }
        }

        let rules = table
            .rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Vec<_>>();
        let registry = Self {
            version: table.version,
            rules,
            standard_vaccines: table
                .standard_vaccines
                .into_iter()
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty())
                .collect(),
            pneumococcal: table.pneumococcal,
        };
        registry.validate()?;

        log::info!(
            "loaded vaccine rule table {} ({} rules, {} standard vaccines)",
            registry.version,
            registry.rules.len(),
            registry.standard_vaccines.len()
        );
        Ok(registry)
    }

    /// The rule table shipped with the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_ron_str(DEFAULT_RULES)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let unknown = |context: &str, key: &str| RegistryError::UnknownRule {
            context: context.to_owned(),
            key: key.to_owned(),
        };

        if let Some(families) = &self.pneumococcal {
            for key in std::iter::once(&families.polysaccharide).chain(&families.conjugates) {
                if self.rule(key).is_none() {
                    return Err(unknown("pneumococcal families", key));
                }
            }
        }

        for rule in &self.rules {
            for (plan_name, plan) in rule.plans() {
                if plan.intervals.first().is_some_and(Option::is_some) {
                    return Err(RegistryError::LeadingInterval {
                        rule: rule.key().to_owned(),
                        plan: plan_name,
                    });
                }
            }

            match rule.kind() {
                RuleKind::AgeRangeCourses(group) => {
                    if let Some(switch) = &group.switch {
                        for course in [&switch.inactivated, &switch.completion] {
                            if !group.courses.iter().any(|c| &c.display == course) {
                                return Err(RegistryError::UnknownCourse {
                                    rule: rule.key().to_owned(),
                                    course: course.clone(),
                                });
                            }
                        }
                    }
                }
                RuleKind::Equivalence(group) => {
                    if let Some(follow_up) = &group.monovalent {
                        if self.rule(&follow_up.rule).is_none() {
                            return Err(unknown(rule.key(), &follow_up.rule));
                        }
                        if !group.members.contains_key(&follow_up.member) {
                            return Err(RegistryError::UnknownMember {
                                rule: rule.key().to_owned(),
                                member: follow_up.member.clone(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in table order, which is also dispatch order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn rule(&self, key: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|rule| rule.key() == key)
    }

    pub fn standard_vaccines(&self) -> &[String] {
        &self.standard_vaccines
    }

    pub fn pneumococcal(&self) -> Option<&ProductFamilies> {
        self.pneumococcal.as_ref()
    }

    /// Whether a canonical product name belongs to a rule or course flagged live.
    pub fn is_live_name(&self, canonical: &str) -> bool {
        self.rules.iter().any(|rule| rule.marks_live(canonical))
    }

    /// Rules protecting against `antigen`.
    pub fn providers_of<'a>(
        &'a self,
        antigen: &'a str,
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.definition.provides.iter().any(|a| a == antigen))
    }
}
