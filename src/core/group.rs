//! Group filter algebra: deciding whether a project's group labels are
//! selected by a comma-separated include/exclude filter string.

/// A single filter entry: a group name, plus whether it excludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTag {
    pub name: String,
    pub exclude: bool,
}

impl GroupTag {
    fn new(name: impl Into<String>, exclude: bool) -> Self {
        Self {
            name: name.into(),
            exclude,
        }
    }
}

/// An ordered list of filter entries, later entries superseding earlier
/// ones with the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    entries: Vec<GroupTag>,
}

impl GroupFilter {
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    /// Parse a comma-separated filter string. Each entry is `name`,
    /// `+name` (include), or `-name` (exclude). A later entry for an
    /// identical name replaces the earlier one.
    pub fn parse(spec: &str) -> Self {
        let mut filter = Self::empty();
        for raw in spec.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (name, exclude) = match raw.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (raw.strip_prefix('+').unwrap_or(raw), false),
            };
            filter.insert(name, exclude);
        }
        filter
    }

    fn insert(&mut self, name: &str, exclude: bool) {
        self.entries.retain(|e| e.name != name);
        self.entries.push(GroupTag::new(name, exclude));
    }

    fn find(&self, name: &str) -> Option<&GroupTag> {
        self.entries.iter().rev().find(|e| e.name == name)
    }

    /// Decide whether a project whose group labels are `groups` is
    /// included by this filter.
    pub fn includes(&self, groups: &[String]) -> bool {
        let include_default = self.find("default").map(|e| !e.exclude).unwrap_or(true);
        let include_all = self
            .find("all")
            .map(|e| !e.exclude)
            .unwrap_or(false);

        let mut included = include_all;

        if groups.is_empty() || groups.iter().any(|g| g == "default") {
            included = included || include_default;
            return included;
        }

        for entry in &self.entries {
            if groups.iter().any(|g| g == &entry.name) {
                included = !entry.exclude;
            }
        }
        included
    }
}
