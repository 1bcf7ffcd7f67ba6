//! Schema-aware document validation.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use mdv_core::schema::{is_builtin_type, FieldKind, TypeTraits};
use mdv_core::wikilink::split_fragment;
use mdv_core::{ParsedDocument, ParsedObject, ParsedTrait, Schema, TypeDef, VaultConfig};
use mdv_index::DuplicateAlias;

use crate::accumulator::{CheckAccumulator, MissingRef};
use crate::confidence::{classify, Confidence};
use crate::fields::{check_field, check_trait_value, ValueProblem};
use crate::issue::{Issue, IssueKind, SchemaIssue};
use crate::resolver::{MatchSource, Resolution, Resolver, ResolverOptions};

pub use mdv_core::schema::RESERVED_KEYS;

/// Identity of one object in the vault, as the validator needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub id: String,
    pub object_type: String,
    /// Value of the type's `name_field`, if it has one.
    pub name: Option<String>,
}

/// Collect [`ObjectInfo`] for every object in `documents`.
pub fn object_infos(schema: &Schema, documents: &[ParsedDocument]) -> Vec<ObjectInfo> {
    documents
        .iter()
        .flat_map(|doc| doc.objects.iter())
        .map(|obj| {
            let name = schema
                .type_def(&obj.object_type)
                .and_then(|def| def.name_field.as_deref())
                .and_then(|field| obj.fields.get(field))
                .and_then(|value| value.as_str())
                .map(str::to_string);
            ObjectInfo {
                id: obj.id.clone(),
                object_type: obj.object_type.clone(),
                name,
            }
        })
        .collect()
}

/// Validates documents against a schema with knowledge of every object in the vault.
pub struct Validator<'a> {
    schema: &'a Schema,
    resolver: Resolver,
    object_types: BTreeMap<String, String>,
    duplicate_aliases: Vec<DuplicateAlias>,
}

impl<'a> Validator<'a> {
    pub fn new(
        schema: &'a Schema,
        config: &VaultConfig,
        objects: &[ObjectInfo],
        aliases: BTreeMap<String, String>,
        duplicate_aliases: Vec<DuplicateAlias>,
    ) -> Self {
        let names = objects
            .iter()
            .filter_map(|o| o.name.clone().map(|name| (name, o.id.clone())))
            .collect();
        let resolver = Resolver::new(
            objects.iter().map(|o| o.id.clone()),
            ResolverOptions {
                daily_directory: config.daily_directory.clone(),
                aliases,
                names,
            },
        );
        let object_types = objects
            .iter()
            .map(|o| (o.id.clone(), o.object_type.clone()))
            .collect();
        Validator {
            schema,
            resolver,
            object_types,
            duplicate_aliases,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Validate one document. Findings that span the whole pass (missing
    /// references, undefined traits, type and trait usage) go into `acc`.
    pub fn validate_document(&self, doc: &ParsedDocument, acc: &mut CheckAccumulator) -> Vec<Issue> {
        let mut issues = Vec::new();
        let file = doc.file_path.as_str();

        let mut seen = BTreeSet::new();
        for obj in &doc.objects {
            if !seen.insert(obj.id.as_str()) {
                issues.push(
                    Issue::error(
                        IssueKind::DuplicateObjectId,
                        file,
                        obj.line,
                        format!("Duplicate object ID '{}'", obj.id),
                    )
                    .with_value(&obj.id)
                    .with_hint("Rename one of the duplicate objects"),
                );
            }
        }

        for obj in &doc.objects {
            self.validate_object(doc, obj, acc, &mut issues);
        }

        for usage in &doc.traits {
            self.validate_trait(file, usage, acc, &mut issues);
        }

        for reference in &doc.refs {
            if self.is_typed_field_ref(doc, reference.source_id.as_str(), reference.field.as_deref()) {
                continue;
            }
            self.validate_ref(
                file,
                &reference.source_id,
                &reference.target_raw,
                reference.line,
                None,
                acc,
                &mut issues,
            );
        }

        debug!(file, issues = issues.len(), "validated document");
        issues
    }

    fn validate_object(
        &self,
        doc: &ParsedDocument,
        obj: &ParsedObject,
        acc: &mut CheckAccumulator,
        issues: &mut Vec<Issue>,
    ) {
        let file = doc.file_path.as_str();
        acc.mark_type_used(&obj.object_type);

        let Some(def) = self.schema.type_def(&obj.object_type) else {
            issues.push(
                Issue::error(
                    IssueKind::UnknownType,
                    file,
                    obj.line,
                    format!("Unknown type '{}'", obj.object_type),
                )
                .with_value(&obj.object_type)
                .with_hint(format!("Add type '{}' to schema.yaml", obj.object_type)),
            );
            return;
        };

        if obj.embedded && obj.anonymous {
            issues.push(
                Issue::error(
                    IssueKind::MissingEmbeddedId,
                    file,
                    obj.line,
                    "Embedded object missing 'id' field",
                )
                .with_value(&obj.object_type)
                .with_hint("Add an 'id' argument to the declaration"),
            );
        }

        for (name, field) in &def.fields {
            let present = obj.fields.get(name).is_some_and(|v| !v.is_empty());
            if field.required && !field.has_default() && !present {
                issues.push(
                    Issue::error(
                        IssueKind::MissingRequiredField,
                        file,
                        obj.line,
                        format!("Required field '{name}' is missing"),
                    )
                    .with_value(name)
                    .with_hint(format!("Add '{name}' to '{}'", obj.id)),
                );
            }
        }

        for (name, value) in &obj.fields {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            let line = obj.field_line(name);
            match def.fields.get(name) {
                Some(field) => {
                    if let Some(problem) = check_field(name, value, field) {
                        issues.push(problem_issue(file, line, problem));
                    }
                }
                None if !is_builtin_type(&obj.object_type) => issues.push(
                    Issue::warning(
                        IssueKind::UnknownFrontmatterKey,
                        file,
                        line,
                        format!("Unknown frontmatter key '{name}' for type '{}'", obj.object_type),
                    )
                    .with_value(name)
                    .with_hint(format!(
                        "Add field '{name}' to type '{}', or remove it from the file",
                        obj.object_type
                    )),
                ),
                None => {}
            }
        }

        for (name, field) in def.fields.iter().filter(|(_, f)| f.is_ref()) {
            let Some(value) = obj.fields.get(name) else {
                continue;
            };
            for target in value.ref_targets(true) {
                let line = doc
                    .refs
                    .iter()
                    .find(|r| {
                        r.source_id == obj.id
                            && r.field.as_deref() == Some(name.as_str())
                            && r.target_raw == target
                    })
                    .map_or_else(|| obj.field_line(name), |r| r.line);
                self.validate_ref(
                    file,
                    &obj.id,
                    target,
                    line,
                    Some((name.as_str(), field.ref_target())),
                    acc,
                    issues,
                );
            }
        }

        self.check_required_traits(doc, obj, def, issues);
    }

    fn check_required_traits(
        &self,
        doc: &ParsedDocument,
        obj: &ParsedObject,
        def: &TypeDef,
        issues: &mut Vec<Issue>,
    ) {
        for name in def.traits.required() {
            let defaulted = match &def.traits {
                TypeTraits::Map(map) => map.get(name).is_some_and(|u| u.default.is_some()),
                TypeTraits::List(_) => false,
            };
            let used = doc
                .traits
                .iter()
                .any(|t| t.object_id == obj.id && t.name == name);
            if !defaulted && !used {
                issues.push(
                    Issue::error(
                        IssueKind::MissingRequiredTrait,
                        &doc.file_path,
                        obj.line,
                        format!(
                            "Type '{}' requires trait '@{name}' but '{}' has none",
                            obj.object_type, obj.id
                        ),
                    )
                    .with_value(name)
                    .with_hint(format!("Add @{name} to '{}'", obj.id)),
                );
            }
        }
    }

    fn validate_trait(
        &self,
        file: &str,
        usage: &ParsedTrait,
        acc: &mut CheckAccumulator,
        issues: &mut Vec<Issue>,
    ) {
        let name = usage.name.as_str();
        acc.mark_trait_used(name);

        let Some(def) = self.schema.traits.get(name) else {
            issues.push(
                Issue::warning(
                    IssueKind::UndefinedTrait,
                    file,
                    usage.line,
                    format!("Undefined trait '@{name}'"),
                )
                .with_value(name)
                .with_hint(format!("Add trait '{name}' to schema.yaml")),
            );
            acc.track_undefined_trait(name, file, usage.line, usage.value.is_some());
            return;
        };

        match (&usage.value, def.is_marker()) {
            (Some(_), true) => issues.push(
                Issue::warning(
                    IssueKind::InvalidTraitValue,
                    file,
                    usage.line,
                    format!("Trait '@{name}' is a marker trait and should not have a value"),
                )
                .with_value(name)
                .with_hint(format!("Use @{name} instead of @{name}(...)")),
            ),
            (None, false) if def.default.is_none() => issues.push(
                Issue::warning(
                    IssueKind::InvalidTraitValue,
                    file,
                    usage.line,
                    format!("Trait '@{name}' expects a value"),
                )
                .with_value(name)
                .with_hint(format!("Add a value: @{name}(<value>)")),
            ),
            (Some(raw), false) => {
                if let Some(problem) = check_trait_value(name, raw, def) {
                    issues.push(problem_issue(file, usage.line, problem));
                }
            }
            _ => {}
        }
    }

    /// Whether `field` on `source_id` is a `ref` field, so its links are
    /// validated through the field and must not be reported twice.
    fn is_typed_field_ref(&self, doc: &ParsedDocument, source_id: &str, field: Option<&str>) -> bool {
        let Some(field) = field else {
            return false;
        };
        doc.object(source_id)
            .and_then(|obj| self.schema.type_def(&obj.object_type))
            .and_then(|def| def.fields.get(field))
            .is_some_and(|f| f.is_ref())
    }

    /// `typed` carries the field name and its declared target type, for
    /// references written in a `ref` field.
    #[allow(clippy::too_many_arguments)]
    fn validate_ref(
        &self,
        file: &str,
        source_id: &str,
        raw: &str,
        line: usize,
        typed: Option<(&str, Option<&str>)>,
        acc: &mut CheckAccumulator,
        issues: &mut Vec<Issue>,
    ) {
        let field_name = typed.map(|(name, _)| name);
        let target_type = typed.and_then(|(_, target)| target);

        match self.resolver.resolve(raw) {
            Resolution::Ambiguous(matches) => issues.push(
                Issue::error(
                    IssueKind::AmbiguousReference,
                    file,
                    line,
                    format!("Reference [[{raw}]] is ambiguous (matches: {})", matches.join(", ")),
                )
                .with_value(raw)
                .with_hint("Use a more specific path to disambiguate"),
            ),
            Resolution::NotFound => {
                if let Some(parent) = self.stale_fragment_parent(raw) {
                    issues.push(
                        Issue::warning(
                            IssueKind::StaleFragment,
                            file,
                            line,
                            format!("Reference [[{raw}]] points to a section that no longer exists in '{parent}'"),
                        )
                        .with_value(raw)
                        .with_hint(format!("Link to [[{parent}]] or to an existing heading")),
                    );
                    return;
                }

                let (confidence, inferred) = classify(self.schema, raw, target_type);
                let mut issue = Issue::error(
                    IssueKind::MissingReference,
                    file,
                    line,
                    format!("Reference [[{raw}]] not found"),
                )
                .with_value(raw);
                issue = match (confidence, &inferred) {
                    (Confidence::Certain, Some(ty)) => issue
                        .with_fix_command("mdv check --create-missing --confirm")
                        .with_hint(format!("Create the missing {ty}")),
                    (Confidence::Inferred, Some(ty)) => {
                        issue.with_hint(format!("Create the missing {ty} (inferred from path)"))
                    }
                    _ => issue.with_hint("Create the missing page or correct the reference"),
                };
                issues.push(issue);

                acc.track_missing_ref(MissingRef {
                    target_path: raw.to_string(),
                    inferred_type: inferred,
                    confidence,
                    source_object_id: source_id.to_string(),
                    source_file: file.to_string(),
                    field_source: (confidence == Confidence::Certain)
                        .then(|| field_name.map(str::to_string))
                        .flatten(),
                    line,
                });
            }
            Resolution::Found { id, source } => {
                if !raw.contains('/')
                    && id.contains('/')
                    && matches!(source, MatchSource::ShortName | MatchSource::Suffix)
                {
                    issues.push(
                        Issue::warning(
                            IssueKind::ShortRefCouldBeFullPath,
                            file,
                            line,
                            format!("Short reference [[{raw}]] could be written as [[{id}]] for clarity"),
                        )
                        .with_value(raw)
                        .with_hint(format!("Use the full path: [[{id}]]"))
                        .with_suggestion(&id),
                    );
                }

                if let (Some(expected), Some(actual)) = (target_type, self.object_types.get(&id)) {
                    if actual != expected {
                        issues.push(
                            Issue::error(
                                IssueKind::WrongTargetType,
                                file,
                                line,
                                format!(
                                    "Field '{}' expects type '{expected}', but [[{raw}]] is type '{actual}'",
                                    field_name.unwrap_or_default()
                                ),
                            )
                            .with_value(raw)
                            .with_hint(format!(
                                "Reference a '{expected}' object instead, or change the field's target"
                            )),
                        );
                    }
                }
            }
        }
    }

    /// For `file#fragment` where the file exists but the fragment does not,
    /// the file's ID.
    fn stale_fragment_parent(&self, raw: &str) -> Option<String> {
        let (base, fragment) = split_fragment(raw);
        fragment?;
        let base = base.trim();
        if base.is_empty() {
            return None;
        }
        match self.resolver.resolve(base) {
            Resolution::Found { id, .. } if !id.contains('#') => Some(id),
            _ => None,
        }
    }

    /// Whole-schema integrity checks, run once after every document.
    pub fn validate_schema(&self, acc: &CheckAccumulator) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();

        for (name, _) in self.schema.user_types() {
            if !acc.is_type_used(name) {
                issues.push(
                    SchemaIssue::warning(
                        IssueKind::UnusedType,
                        name,
                        format!("Type '{name}' is defined in schema but never used"),
                    )
                    .with_hint(format!("Create a file with 'type: {name}' or remove the type")),
                );
            }
        }

        for name in self.schema.traits.keys() {
            if !acc.is_trait_used(name) {
                issues.push(
                    SchemaIssue::warning(
                        IssueKind::UnusedTrait,
                        name,
                        format!("Trait '@{name}' is defined in schema but never used"),
                    )
                    .with_hint(format!("Use @{name} in a file or remove the trait")),
                );
            }
        }

        for (type_name, def) in &self.schema.types {
            for (field_name, field) in &def.fields {
                let qualified = format!("{type_name}.{field_name}");
                match field.field_type.kind {
                    FieldKind::Ref => match field.ref_target() {
                        None => issues.push(
                            SchemaIssue::error(
                                IssueKind::MissingTargetType,
                                &qualified,
                                format!("Field '{qualified}' is a ref but declares no target"),
                            )
                            .with_hint("Add 'target: <type>' to the field"),
                        ),
                        Some(target) if self.schema.type_def(target).is_none() => issues.push(
                            SchemaIssue::error(
                                IssueKind::MissingTargetType,
                                target,
                                format!("Field '{qualified}' references non-existent type '{target}'"),
                            )
                            .with_hint(format!("Add type '{target}' to schema or change the target")),
                        ),
                        Some(target) if target == type_name.as_str() && field.required && !field.has_default() => {
                            issues.push(
                                SchemaIssue::warning(
                                    IssueKind::SelfReferentialRequired,
                                    &qualified,
                                    format!(
                                        "Type '{type_name}' has required field '{field_name}' that references itself - impossible to create first instance"
                                    ),
                                )
                                .with_hint("Make the field optional or give it a default"),
                            );
                        }
                        Some(_) => {}
                    },
                    FieldKind::Enum if field.values.is_empty() => issues.push(
                        SchemaIssue::error(
                            IssueKind::EnumWithoutValues,
                            &qualified,
                            format!("Field '{qualified}' is an enum but declares no values"),
                        )
                        .with_hint("Add 'values: [...]' to the field"),
                    ),
                    _ => {}
                }
            }

            for required in def.traits.required() {
                if !self.schema.traits.contains_key(required) {
                    issues.push(
                        SchemaIssue::error(
                            IssueKind::UndefinedRequiredTrait,
                            required,
                            format!("Type '{type_name}' requires trait '@{required}', which is not defined"),
                        )
                        .with_hint(format!("Add trait '{required}' to schema.yaml")),
                    );
                }
            }
        }

        for (name, def) in &self.schema.traits {
            let is_enum = def.trait_type.is_some_and(|t| t.kind == FieldKind::Enum);
            if is_enum && def.values.is_empty() {
                issues.push(
                    SchemaIssue::error(
                        IssueKind::EnumWithoutValues,
                        name,
                        format!("Trait '@{name}' is an enum but declares no values"),
                    )
                    .with_hint("Add 'values: [...]' to the trait"),
                );
            }
        }

        for collision in self.resolver.alias_collisions() {
            issues.push(
                SchemaIssue::error(
                    IssueKind::AliasCollision,
                    &collision.alias,
                    format!(
                        "Alias '{}' of '{}' collides with {}",
                        collision.alias,
                        collision.alias_target,
                        collision.conflicts_with.join(", ")
                    ),
                )
                .with_hint("Choose an alias that is not another object's name or ID"),
            );
        }

        for duplicate in &self.duplicate_aliases {
            issues.push(
                SchemaIssue::warning(
                    IssueKind::DuplicateAlias,
                    &duplicate.alias,
                    format!(
                        "Alias '{}' is used by multiple objects: {}",
                        duplicate.alias,
                        duplicate.object_ids.join(", ")
                    ),
                )
                .with_hint("Keep the alias on one object only"),
            );
        }

        issues
    }
}

fn problem_issue(file: &str, line: usize, problem: ValueProblem) -> Issue {
    let mut issue = Issue::error(problem.kind, file, line, problem.message).with_value(problem.value);
    if let Some(suggestion) = problem.suggestion {
        issue = issue
            .with_hint(format!("Remove the quotes: {suggestion}"))
            .with_suggestion(suggestion);
    }
    issue
}
