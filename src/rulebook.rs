//! rulebook.rs
//! The entry point: resolves a schema, builds every template once and owns
//! the arena of live entities. Each mutating call runs inside its own undo
//! journal, so a failure leaves the world as it was.

use crate::computation::engine::{attr_of, live};
use crate::computation::{Engine, EngineConfig, Ledger};
use crate::display::trace::format_trace;
use crate::entity::{Entity, Scope};
use crate::error::RulebookError;
use crate::expr::{EvalProps, RollMode};
use crate::schema::{resolve, Schema, TemplateSchema};
use crate::store::{EntityId, Registry};
use crate::template::Template;
use crate::value::Value;
use indexmap::IndexMap;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;

pub struct Rulebook {
    templates: IndexMap<String, Arc<Template>>,
    entities: Registry<Entity>,
    rng: StdRng,
    config: EngineConfig,
}

impl Rulebook {
    pub fn new(schema: &Schema) -> Result<Self, RulebookError> {
        Self::with_config(schema, EngineConfig::default())
    }

    pub fn with_config(schema: &Schema, config: EngineConfig) -> Result<Self, RulebookError> {
        // 1. Flatten includes and pair reverse attributes.
        let resolved = resolve(schema)?;

        // 2. Templates are independent of each other once resolved.
        let known = |name: &str| resolved.contains_key(name);
        let entries: Vec<(&String, &TemplateSchema)> = resolved.iter().collect();
        let built = entries
            .par_iter()
            .map(|(name, schema)| Template::build(name, schema, &known).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let templates: IndexMap<String, Arc<Template>> =
            built.into_iter().map(|t| (t.name().to_string(), t)).collect();

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        info!("rulebook ready with {} templates", templates.len());
        Ok(Self { templates, entities: Registry::new(), rng, config })
    }

    /// Parses a JSON schema document of the shape `{ name: { includes, attrs } }`.
    pub fn from_json(text: &str) -> Result<Self, RulebookError> {
        let schema: Schema = serde_json::from_str(text).map_err(|e| RulebookError::MalformedSchema(e.to_string()))?;
        Self::new(&schema)
    }

    // --- Introspection ---

    pub fn template(&self, name: &str) -> Option<&Arc<Template>> { self.templates.get(name) }
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> { self.templates.values() }
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn entity_count(&self) -> usize { self.entities.len() }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> { self.entities.get(id) }

    pub fn get(&self, id: EntityId, attr: &str) -> Result<&Value, RulebookError> {
        let entity = live(&self.entities, id)?;
        Ok(entity.value_at(attr_of(entity, attr)?))
    }

    // --- Mutation ---

    pub fn create(&mut self, template: &str, data: IndexMap<String, Value>) -> Result<EntityId, RulebookError> {
        let template = self
            .templates
            .get(template)
            .cloned()
            .ok_or_else(|| RulebookError::MalformedSchema(format!("Unknown template \"{}\"", template)))?;
        self.transact(|engine| engine.create(template, data))
    }

    /// Creates an entity from a JSON object of initial values.
    pub fn create_from_json(&mut self, template: &str, json: &str) -> Result<EntityId, RulebookError> {
        let raw: IndexMap<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| RulebookError::AttributeType(e.to_string()))?;
        let data = raw
            .iter()
            .map(|(k, v)| {
                Value::from_json(v)
                    .map(|value| (k.clone(), value))
                    .map_err(|e| RulebookError::AttributeType(format!("\"{}\": {}", k, e)))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;
        self.create(template, data)
    }

    pub fn set(&mut self, id: EntityId, attr: &str, value: impl Into<Value>) -> Result<(), RulebookError> {
        let value = value.into();
        self.transact(|engine| engine.set(id, attr, value))
    }

    pub fn destroy(&mut self, id: EntityId) -> Result<(), RulebookError> {
        self.transact(|engine| engine.destroy(id))
    }

    fn transact<T>(&mut self, op: impl FnOnce(&mut Engine<'_>) -> Result<T, RulebookError>) -> Result<T, RulebookError> {
        let mut journal = Ledger::new();
        let result = {
            let mut engine = Engine::new(&mut self.entities, &mut journal, &mut self.rng, &self.config);
            op(&mut engine)
        };
        match result {
            Ok(value) => {
                journal.commit(&mut self.entities);
                Ok(value)
            }
            Err(e) => {
                warn!("rolling back {} writes: {}", journal.len(), e);
                journal.rollback(&mut self.entities);
                Err(e)
            }
        }
    }

    // --- Presentation ---

    /// Evaluates a calculated attribute without storing the result.
    pub fn preview(&mut self, id: EntityId, attr: &str, mode: RollMode) -> Result<Value, RulebookError> {
        let entity = live(&self.entities, id)?;
        let i = attr_of(entity, attr)?;
        let def = &entity.template().attrs()[i];
        let Some(calc) = &def.calc else { return Ok(entity.value_at(i).clone()) };
        let scope = Scope::new(&self.entities, entity);
        let mut props = EvalProps { bindings: &scope, mode, rng: &mut self.rng };
        calc.eval(&mut props)
            .map_err(|e| RulebookError::expression(format!("{}.{}", entity.template_name(), def.name), e))
    }

    /// The formula of `attr`; with `dice_only` every identifier is replaced by
    /// its value and only dice stay symbolic. Stored attributes describe as their value.
    pub fn describe(&self, id: EntityId, attr: &str, dice_only: bool) -> Result<String, RulebookError> {
        let entity = live(&self.entities, id)?;
        let i = attr_of(entity, attr)?;
        match &entity.template().attrs()[i].calc {
            Some(calc) => Ok(calc.describe(&Scope::new(&self.entities, entity), dice_only)),
            None => Ok(entity.value_at(i).literal()),
        }
    }

    /// Audit trace of the dependency tree under `attr`.
    pub fn trace(&self, id: EntityId, attr: &str) -> Result<String, RulebookError> {
        let entity = live(&self.entities, id)?;
        let i = attr_of(entity, attr)?;
        Ok(format_trace(entity, i))
    }
}
