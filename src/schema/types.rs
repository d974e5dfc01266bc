//! Raw schema input: one `TemplateSchema` per template name.
use crate::expr::ExprType;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Template name -> declaration, in declaration order.
pub type Schema = IndexMap<String, TemplateSchema>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub attrs: IndexMap<String, AttrSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<ExprType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutable: Option<bool>,
    /// Accepts a single name or a list of names.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_type: Option<ExprType>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub reverse_entity_types: Option<Vec<String>>,
}

impl AttrSchema {
    pub fn of_type(ty: ExprType) -> Self {
        Self { ty: Some(ty), ..Self::default() }
    }

    pub fn calc(ty: ExprType, formula: &str) -> Self {
        Self { ty: Some(ty), calc: Some(formula.to_string()), ..Self::default() }
    }

    pub fn link(ty: ExprType, targets: &[&str], reverse: Option<&str>) -> Self {
        Self {
            ty: Some(ty),
            entity_types: Some(targets.iter().map(|t| t.to_string()).collect()),
            reverse: reverse.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_valid(mut self, formula: &str) -> Self {
        self.valid = Some(formula.to_string());
        self
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = Some(false);
        self
    }

    /// Fills every unset field from `base`. An attribute that defines its own
    /// formula kind does not pick up the other kind from `base`.
    pub(crate) fn inherit(&mut self, base: &AttrSchema) {
        let own_calc = self.calc.is_some();
        let own_stored = self.valid.is_some() || self.mutable == Some(true);

        if self.ty.is_none() { self.ty = base.ty; }
        if self.calc.is_none() && !own_stored { self.calc = base.calc.clone(); }
        if !own_calc {
            if self.valid.is_none() { self.valid = base.valid.clone(); }
            if self.mutable.is_none() { self.mutable = base.mutable; }
        }
        if self.entity_types.is_none() { self.entity_types = base.entity_types.clone(); }
        if self.reverse.is_none() { self.reverse = base.reverse.clone(); }
        if self.reverse_type.is_none() { self.reverse_type = base.reverse_type; }
        if self.reverse_entity_types.is_none() { self.reverse_entity_types = base.reverse_entity_types.clone(); }
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    }))
}
