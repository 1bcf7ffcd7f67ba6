//! Reference resolution: turns the text inside `[[...]]` into an object ID.
//!
//! Candidates are collected from every source in priority order (alias,
//! name field, date, then path or short-name matching). More than one
//! distinct candidate is ambiguous, except that a file beats its own
//! sections.

use std::collections::{BTreeMap, BTreeSet};

use mdv_core::paths::{is_valid_date, normalize_dir, short_name, slugify, slugify_path, split_embedded_id};

/// Where a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Alias,
    NameField,
    Date,
    ObjectId,
    Suffix,
    ShortName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found { id: String, source: MatchSource },
    Ambiguous(Vec<String>),
    NotFound,
}

/// Alias lookups and display-name lookups feeding the resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub daily_directory: String,
    /// Alias → object ID.
    pub aliases: BTreeMap<String, String>,
    /// `(name_field value, object ID)` pairs.
    pub names: Vec<(String, String)>,
}

/// An alias that shadows another object's short name or ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCollision {
    pub alias: String,
    pub alias_target: String,
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    ids: BTreeSet<String>,
    short: BTreeMap<String, Vec<String>>,
    slugs: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    raw_aliases: BTreeMap<String, String>,
    names: BTreeMap<String, Vec<String>>,
    daily_directory: String,
}

struct Matches {
    found: Vec<(String, MatchSource)>,
}

impl Matches {
    fn add(&mut self, id: &str, source: MatchSource) {
        if !id.is_empty() && !self.found.iter().any(|(existing, _)| existing == id) {
            self.found.push((id.to_string(), source));
        }
    }
}

impl Resolver {
    pub fn new<I, S>(ids: I, options: ResolverOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolver = Resolver {
            daily_directory: normalize_dir(&options.daily_directory)
                .trim_end_matches('/')
                .to_string(),
            ..Resolver::default()
        };
        if resolver.daily_directory.is_empty() {
            resolver.daily_directory = "daily".to_string();
        }

        for id in ids {
            let id: String = id.into();
            resolver
                .short
                .entry(short_name(&id).to_string())
                .or_default()
                .push(id.clone());
            resolver.slugs.entry(slugify_path(&id)).or_insert_with(|| id.clone());
            resolver.ids.insert(id);
        }
        for ids in resolver.short.values_mut() {
            ids.sort();
        }

        for (alias, target) in options.aliases {
            if alias.is_empty() {
                continue;
            }
            let slug = slugify(&alias);
            if !slug.is_empty() && slug != alias {
                resolver.aliases.entry(slug).or_insert_with(|| target.clone());
            }
            resolver.aliases.insert(alias.clone(), target.clone());
            resolver.raw_aliases.insert(alias, target);
        }

        for (name, id) in options.names {
            if name.is_empty() {
                continue;
            }
            let slug = slugify(&name);
            let lower = name.to_lowercase();
            let mut keys = vec![name.clone()];
            if !slug.is_empty() && slug != name {
                keys.push(slug.clone());
            }
            if lower != name && lower != slug {
                keys.push(lower);
            }
            for key in keys {
                resolver.names.entry(key).or_default().push(id.clone());
            }
        }

        resolver
    }

    pub fn exists(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn resolve(&self, raw: &str) -> Resolution {
        let reference = raw.trim();
        let slug = slugify(reference);
        let lower = reference.to_lowercase();
        let mut matches = Matches { found: Vec::new() };

        if let Some(target) = self
            .aliases
            .get(reference)
            .or_else(|| self.aliases.get(&slug))
        {
            matches.add(target, MatchSource::Alias);
        }

        let named = self
            .names
            .get(reference)
            .or_else(|| self.names.get(&slug))
            .or_else(|| self.names.get(&lower));
        for id in named.into_iter().flatten() {
            matches.add(id, MatchSource::NameField);
        }

        if is_valid_date(reference) {
            let date_id = format!("{}/{reference}", self.daily_directory);
            if matches.found.is_empty() {
                return Resolution::Found {
                    id: date_id,
                    source: MatchSource::Date,
                };
            }
            matches.add(&date_id, MatchSource::Date);
        } else if reference.contains('/') || reference.contains('#') {
            self.add_path_matches(&mut matches, reference);
        } else {
            self.add_short_matches(&mut matches, reference, &slug);
        }

        let mut found = matches.found;
        if found.len() > 1 {
            found = prefer_parents(found);
        }
        match found.len() {
            0 => Resolution::NotFound,
            1 => {
                let (id, source) = found.remove(0);
                Resolution::Found { id, source }
            }
            _ => Resolution::Ambiguous(found.into_iter().map(|(id, _)| id).collect()),
        }
    }

    fn add_path_matches(&self, matches: &mut Matches, reference: &str) {
        if self.ids.contains(reference) {
            matches.add(reference, MatchSource::ObjectId);
        }
        if let Some((base, fragment)) = split_embedded_id(reference) {
            let full = format!("{}#{fragment}", base.strip_suffix(".md").unwrap_or(base));
            if self.ids.contains(&full) {
                matches.add(&full, MatchSource::ObjectId);
            }
        }
        let slugged = slugify_path(reference);
        if let Some(id) = self.slugs.get(&slugged) {
            matches.add(id, MatchSource::ObjectId);
        }
        if matches.found.is_empty() {
            let suffix = format!("/{reference}");
            let slug_suffix = format!("/{slugged}");
            for id in &self.ids {
                if id.ends_with(&suffix) || id.ends_with(&slug_suffix) {
                    matches.add(id, MatchSource::Suffix);
                }
            }
        }
    }

    fn add_short_matches(&self, matches: &mut Matches, reference: &str, slug: &str) {
        let direct = self
            .short
            .get(reference)
            .filter(|ids| !ids.is_empty())
            .or_else(|| self.short.get(slug));
        if let Some(ids) = direct {
            for id in ids {
                matches.add(id, MatchSource::ShortName);
            }
            return;
        }
        let suffix = format!("/{reference}");
        let slug_suffix = format!("/{slug}");
        for id in &self.ids {
            let short = short_name(id);
            if short == reference || short == slug || id.ends_with(&suffix) || id.ends_with(&slug_suffix) {
                matches.add(id, MatchSource::ShortName);
            }
        }
    }

    /// Aliases that equal another object's short name or ID.
    pub fn alias_collisions(&self) -> Vec<AliasCollision> {
        let mut collisions = Vec::new();
        for (alias, target) in &self.raw_aliases {
            let mut conflicts: Vec<String> = self
                .short
                .get(alias)
                .into_iter()
                .flatten()
                .filter(|id| *id != target)
                .cloned()
                .collect();
            if self.ids.contains(alias) && alias != target && !conflicts.contains(alias) {
                conflicts.push(alias.clone());
            }
            if !conflicts.is_empty() {
                collisions.push(AliasCollision {
                    alias: alias.clone(),
                    alias_target: target.clone(),
                    conflicts_with: conflicts,
                });
            }
        }
        collisions
    }
}

/// Drop section matches whose parent file also matched.
fn prefer_parents(found: Vec<(String, MatchSource)>) -> Vec<(String, MatchSource)> {
    let parents: BTreeSet<String> = found
        .iter()
        .filter(|(id, _)| !id.contains('#'))
        .map(|(id, _)| id.clone())
        .collect();
    if parents.is_empty() {
        return found;
    }
    found
        .into_iter()
        .filter(|(id, _)| match split_embedded_id(id) {
            Some((parent, _)) => !parents.contains(parent),
            None => true,
        })
        .collect()
}
