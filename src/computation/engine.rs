//! The reactive recompute engine.
//!
//! One `Engine` lives for the duration of a single public mutation. It
//! writes cells, recomputes the calculated attributes that read them, keeps
//! reverse relationships paired and pushes changes out to linked entities
//! breadth-first until nothing moves. Every write goes through the journal.
//!
//! Assignments made while keeping reverse relationships paired run nested
//! inside the outer one; their linked entities are pooled and propagated once,
//! after every side of the relationship is in place.
use crate::computation::coerce::coerce;
use crate::computation::config::EngineConfig;
use crate::computation::ledger::Ledger;
use crate::entity::{Entity, Scope};
use crate::error::RulebookError;
use crate::expr::{EvalProps, ExprType, RollMode};
use crate::store::{EntityId, Registry};
use crate::template::Template;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use rand::rngs::StdRng;
use std::sync::Arc;

pub struct Engine<'a> {
    entities: &'a mut Registry<Entity>,
    journal: &'a mut Ledger,
    rng: &'a mut StdRng,
    config: &'a EngineConfig,
    /// Nesting of in-flight assignments; propagation runs at depth 0.
    depth: usize,
    /// Linked entities collected by nested assignments.
    pending: IndexSet<EntityId>,
}

pub(crate) fn live(entities: &Registry<Entity>, id: EntityId) -> Result<&Entity, RulebookError> {
    entities.get(id).ok_or_else(|| RulebookError::AttributeType(format!("Entity {} does not exist", id)))
}

pub(crate) fn attr_of(entity: &Entity, name: &str) -> Result<usize, RulebookError> {
    entity.template().attr_index(name).ok_or_else(|| {
        RulebookError::AttributeType(format!("Template \"{}\" has no attribute \"{}\"", entity.template_name(), name))
    })
}

impl<'a> Engine<'a> {
    pub fn new(
        entities: &'a mut Registry<Entity>,
        journal: &'a mut Ledger,
        rng: &'a mut StdRng,
        config: &'a EngineConfig,
    ) -> Self {
        Self { entities, journal, rng, config, depth: 0, pending: IndexSet::new() }
    }

    // --- Public operations ---

    /// Builds a new entity, initializing cells in the template's evaluation order.
    /// Links that carry a reverse are applied last, through `assign`, so both
    /// sides end up paired.
    pub fn create(&mut self, template: Arc<Template>, mut data: IndexMap<String, Value>) -> Result<EntityId, RulebookError> {
        let id = self.entities.next_id();
        let id = self.entities.insert(Entity::new(id, template.clone()));
        self.journal.record_created(id);

        let mut deferred = Vec::new();
        for &i in template.eval_order() {
            let def = &template.attrs()[i];
            let supplied = data.shift_remove(&def.name);
            if def.is_calc() {
                if supplied.is_some() {
                    trace!("{}: ignoring supplied value for calculated \"{}\"", id, def.name);
                }
                let value = self.evaluate(id, i)?;
                self.write(id, i, value);
                continue;
            }
            let Some(raw) = supplied else { continue };
            if def.reverse.is_some() {
                deferred.push((i, raw));
                continue;
            }
            let value = coerce(raw, template.name(), def, self.entities)?;
            self.check_valid(id, i, &value)?;
            self.write(id, i, value);
        }
        for key in data.keys() {
            trace!("{}: ignoring unknown key \"{}\"", id, key);
        }

        for (i, raw) in deferred {
            self.assign(id, i, raw)?;
        }
        debug!("created {} {}", template.name(), id);
        Ok(id)
    }

    /// Assigns a caller-supplied value to a mutable attribute.
    pub fn set(&mut self, id: EntityId, name: &str, value: Value) -> Result<(), RulebookError> {
        let entity = live(self.entities, id)?;
        let attr = attr_of(entity, name)?;
        if !entity.template().attrs()[attr].mutable {
            return Err(RulebookError::AttributeType(format!(
                "Attribute \"{}.{}\" is not mutable",
                entity.template_name(),
                name
            )));
        }
        self.assign(id, attr, value)
    }

    /// Unlinks every relationship of `id`, then frees its slot.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), RulebookError> {
        let entity = live(self.entities, id)?;
        let template = entity.template().clone();

        // 1. Own links: paired ones are cleared on the other side by `assign`.
        for (i, def) in template.attrs().iter().enumerate() {
            if def.ty.is_entity() && !def.is_calc() && !self.value(id, i)?.entities().is_empty() {
                self.assign(id, i, Value::zero(def.ty))?;
            }
        }

        // 2. One-way links held by anyone else.
        let holders: Vec<(EntityId, usize, Value)> = self
            .entities
            .iter()
            .filter(|(other, _)| *other != id)
            .flat_map(|(other, e)| {
                e.template()
                    .attrs()
                    .iter()
                    .enumerate()
                    .filter(|(_, def)| def.ty.is_entity() && !def.is_calc())
                    .filter_map(move |(i, _)| without(e.value_at(i), id).map(|v| (other, i, v)))
            })
            .collect();
        for (other, i, value) in holders {
            self.assign(other, i, value)?;
        }

        // 3. Free the slot.
        self.entities.remove(id);
        debug!("destroyed {} {}", template.name(), id);
        Ok(())
    }

    // --- Assignment ---

    /// The assignment algorithm shared by callers, construction and reverse upkeep.
    pub(crate) fn assign(&mut self, id: EntityId, attr: usize, raw: Value) -> Result<(), RulebookError> {
        let entity = live(self.entities, id)?;
        let template = entity.template().clone();
        let def = &template.attrs()[attr];

        // 1. Reentrancy guard.
        if entity.cells()[attr].is_frozen() {
            trace!("{}: \"{}\" is cascading, write ignored", id, def.name);
            return Ok(());
        }

        // 2. Coerce and validate, nothing written yet.
        let value = coerce(raw, template.name(), def, self.entities)?;
        self.check_valid(id, attr, &value)?;

        // 3. Equal values stop here.
        let entity = live(self.entities, id)?;
        if entity.value_at(attr).same(&value) {
            return Ok(());
        }

        // 4. Snapshot neighbors and current reverse targets.
        let mut neighbors = entity.neighbors();
        neighbors.extend(value.entities().into_iter().filter(|e| *e != id));
        let old_targets = entity.value_at(attr).entities();

        // 5. Store and freeze.
        trace!("{}: {}.{} = {}", id, template.name(), def.name, value);
        self.write(id, attr, value);
        self.freeze(id, attr, true);

        self.depth += 1;
        let result = self.cascade(id, attr, &template, old_targets);
        self.depth -= 1;

        // 8. Linked entities, once the outermost assignment is done.
        self.pending.extend(neighbors);
        let result = match result {
            Ok(()) if self.depth == 0 => {
                let start = std::mem::take(&mut self.pending);
                self.propagate(start)
            }
            Ok(()) => Ok(()),
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        };

        // 9. Unfreeze, also on failure.
        self.freeze(id, attr, false);
        result
    }

    fn cascade(
        &mut self,
        id: EntityId,
        attr: usize,
        template: &Template,
        old_targets: Vec<EntityId>,
    ) -> Result<(), RulebookError> {
        // 6. Calcs on this entity that read the cell.
        let downstream = live(self.entities, id)?.downstream(attr);
        self.recompute(id, &downstream)?;

        // 7. Reverse deltas.
        if let Some(reverse) = &template.attrs()[attr].reverse {
            let new_targets = self.value(id, attr)?.entities();
            for &target in old_targets.iter().filter(|t| !new_targets.contains(t)) {
                self.unlink(target, reverse, id)?;
            }
            for &target in new_targets.iter().filter(|t| !old_targets.contains(t)) {
                self.link(target, reverse, id)?;
            }
        }
        Ok(())
    }

    /// Removes `owner` from `target.reverse`.
    fn unlink(&mut self, target: EntityId, reverse: &str, owner: EntityId) -> Result<(), RulebookError> {
        let Some(entity) = self.entities.get(target) else { return Ok(()) };
        let Some(attr) = entity.template().attr_index(reverse) else { return Ok(()) };
        let next = without(entity.value_at(attr), owner);
        match next {
            Some(next) => self.assign(target, attr, next),
            None => Ok(()),
        }
    }

    /// Adds `owner` to `target.reverse`.
    fn link(&mut self, target: EntityId, reverse: &str, owner: EntityId) -> Result<(), RulebookError> {
        let Some(entity) = self.entities.get(target) else { return Ok(()) };
        let Some(attr) = entity.template().attr_index(reverse) else { return Ok(()) };
        let next = match entity.value_at(attr) {
            Value::Entity(current) if *current == Some(owner) => return Ok(()),
            Value::Entity(_) => Value::Entity(Some(owner)),
            Value::EntityList(ids) if ids.contains(&owner) => return Ok(()),
            Value::EntityList(ids) => {
                let mut ids = ids.clone();
                ids.push(owner);
                Value::EntityList(ids)
            }
            _ => return Ok(()),
        };
        self.assign(target, attr, next)
    }

    // --- Propagation ---

    /// Breadth-first over linked entities: each layer recomputes its link-reading
    /// calcs; entities that changed contribute their neighbors to the next layer.
    fn propagate(&mut self, start: IndexSet<EntityId>) -> Result<(), RulebookError> {
        let mut layer = start;
        let mut rounds = 0;
        while !layer.is_empty() {
            rounds += 1;
            if self.config.max_cascade_rounds.is_some_and(|limit| rounds > limit) {
                let pending = layer
                    .iter()
                    .filter_map(|id| self.entities.get(*id))
                    .map(|e| format!("{}{}", e.template_name(), e.id()))
                    .collect();
                return Err(RulebookError::CascadeLimit { rounds: rounds - 1, pending });
            }

            let mut next = IndexSet::new();
            for id in layer {
                let Some(entity) = self.entities.get(id) else { continue };
                let template = entity.template().clone();
                let linked: Vec<usize> =
                    template.eval_order().iter().copied().filter(|&i| template.reads_links(i)).collect();
                if linked.is_empty() {
                    continue;
                }
                let changed = self.recompute(id, &linked)?;
                if let Some(e) = self.entities.get_mut(id) {
                    e.dirty = changed;
                    if changed {
                        next.extend(e.neighbors());
                    }
                }
            }
            trace!("propagation round {}: {} entities changed", rounds, next.len());
            layer = next;
        }
        Ok(())
    }

    /// Re-evaluates the given calcs in order; true if any stored value changed.
    fn recompute(&mut self, id: EntityId, attrs: &[usize]) -> Result<bool, RulebookError> {
        let mut changed = false;
        for &i in attrs {
            let value = self.evaluate(id, i)?;
            if !self.value(id, i)?.same(&value) {
                self.write(id, i, value);
                changed = true;
            }
        }
        Ok(changed)
    }

    // --- Cells ---

    /// Evaluates the calc of `attr` against current cells and coerces the result.
    /// A member read through an unset link stores the zero of the declared type.
    fn evaluate(&mut self, id: EntityId, attr: usize) -> Result<Value, RulebookError> {
        let entity = live(self.entities, id)?;
        let template = entity.template();
        let def = &template.attrs()[attr];
        let Some(calc) = &def.calc else { return Ok(entity.value_at(attr).clone()) };

        let scope = Scope::new(self.entities, entity);
        let mut props = EvalProps { bindings: &scope, mode: RollMode::Random, rng: &mut *self.rng };
        let raw = calc
            .eval(&mut props)
            .map_err(|e| RulebookError::expression(format!("{}.{}", template.name(), def.name), e))?;
        let raw = match raw {
            Value::Entity(None) if !def.ty.is_entity() && def.ty != ExprType::Any => Value::zero(def.ty),
            raw => raw,
        };
        coerce(raw, template.name(), def, self.entities)
    }

    /// Runs the valid formula of `attr` with `candidate` bound in place of the cell.
    fn check_valid(&mut self, id: EntityId, attr: usize, candidate: &Value) -> Result<(), RulebookError> {
        let entity = live(self.entities, id)?;
        let template = entity.template();
        let def = &template.attrs()[attr];
        let Some(valid) = &def.valid else { return Ok(()) };

        let scope = Scope::new(self.entities, entity).with_candidate(attr, candidate);
        let mut props = EvalProps { bindings: &scope, mode: RollMode::Random, rng: &mut *self.rng };
        let verdict = valid
            .eval(&mut props)
            .map_err(|e| RulebookError::expression(format!("{}.{}", template.name(), def.name), e))?;
        match verdict {
            Value::Bool(true) => Ok(()),
            _ => Err(RulebookError::AttributeType(format!(
                "Attribute \"{}.{}\" rejected {}: \"{}\" does not hold",
                template.name(),
                def.name,
                candidate.literal(),
                valid.source()
            ))),
        }
    }

    fn value(&self, id: EntityId, attr: usize) -> Result<&Value, RulebookError> {
        Ok(live(self.entities, id)?.value_at(attr))
    }

    fn write(&mut self, id: EntityId, attr: usize, value: Value) {
        if let Some(entity) = self.entities.get_mut(id) {
            let old = entity.store(attr, value);
            self.journal.record_write(id, attr, old);
        }
    }

    fn freeze(&mut self, id: EntityId, attr: usize, frozen: bool) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.set_frozen(attr, frozen);
        }
    }
}

/// `value` with every reference to `id` dropped, or `None` if it holds none.
fn without(value: &Value, id: EntityId) -> Option<Value> {
    match value {
        Value::Entity(Some(current)) if *current == id => Some(Value::Entity(None)),
        Value::EntityList(ids) if ids.contains(&id) => {
            Some(Value::EntityList(ids.iter().copied().filter(|e| *e != id).collect()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprType::{EntityList, Number};
    use crate::schema::{AttrSchema, TemplateSchema};
    use rand::SeedableRng;

    struct World {
        entities: Registry<Entity>,
        journal: Ledger,
        rng: StdRng,
        config: EngineConfig,
    }

    impl World {
        fn new() -> Self {
            Self { entities: Registry::new(), journal: Ledger::new(), rng: StdRng::seed_from_u64(7), config: EngineConfig::default() }
        }

        fn engine(&mut self) -> Engine<'_> {
            Engine::new(&mut self.entities, &mut self.journal, &mut self.rng, &self.config)
        }
    }

    fn template(name: &str, attrs: Vec<(&str, AttrSchema)>) -> Arc<Template> {
        let schema = TemplateSchema { includes: Vec::new(), attrs: attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect() };
        Arc::new(Template::build(name, &schema, &|_: &str| true).unwrap())
    }

    fn creature() -> Arc<Template> {
        template(
            "creature",
            vec![
                ("dexterity", AttrSchema::of_type(Number).with_valid("dexterity >= 1 && dexterity <= 30")),
                ("dexMod", AttrSchema::calc(Number, "floor((dexterity - 10) / 2)")),
            ],
        )
    }

    #[test]
    fn test_linear_derivation() {
        let mut world = World::new();
        let id = world
            .engine()
            .create(creature(), IndexMap::from([("dexterity".to_string(), Value::Number(14.0))]))
            .unwrap();
        assert_eq!(world.entities.get(id).unwrap().get("dexMod"), Some(&Value::Number(2.0)));

        world.engine().set(id, "dexterity", Value::Number(16.0)).unwrap();
        assert_eq!(world.entities.get(id).unwrap().get("dexMod"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_equal_assignment_writes_nothing() {
        let mut world = World::new();
        let id = world
            .engine()
            .create(creature(), IndexMap::from([("dexterity".to_string(), Value::Number(14.0))]))
            .unwrap();
        let before = world.journal.len();
        world.engine().set(id, "dexterity", Value::Number(14.0)).unwrap();
        assert_eq!(world.journal.len(), before);
    }

    #[test]
    fn test_rejections() {
        let mut world = World::new();
        assert!(world
            .engine()
            .create(creature(), IndexMap::from([("dexterity".to_string(), Value::Number(0.0))]))
            .is_err());
        let id = world
            .engine()
            .create(creature(), IndexMap::from([("dexterity".to_string(), Value::Number(10.0))]))
            .unwrap();
        assert!(matches!(world.engine().set(id, "dexterity", Value::Number(40.0)), Err(RulebookError::AttributeType(_))));
        assert!(matches!(world.engine().set(id, "dexMod", Value::Number(1.0)), Err(RulebookError::AttributeType(_))));
        assert!(matches!(world.engine().set(id, "wisdom", Value::Number(1.0)), Err(RulebookError::AttributeType(_))));
    }

    fn item() -> Arc<Template> {
        template(
            "item",
            vec![
                ("weight", AttrSchema::of_type(Number)),
                ("totalWeight", AttrSchema::calc(Number, "weight")),
                ("owner", AttrSchema::link(ExprType::Entity, &["container"], Some("inventory"))),
            ],
        )
    }

    fn container() -> Arc<Template> {
        template(
            "container",
            vec![
                ("weight", AttrSchema::of_type(Number)),
                ("inventory", AttrSchema::link(EntityList, &["item", "container"], Some("owner"))),
                ("owner", AttrSchema::link(ExprType::Entity, &["container"], Some("inventory"))),
                ("contentsWeight", AttrSchema::calc(Number, "sum(inventory.totalWeight)")),
                ("totalWeight", AttrSchema::calc(Number, "weight + contentsWeight")),
            ],
        )
    }

    fn weighted(world: &mut World, template: Arc<Template>, weight: f64) -> EntityId {
        world.engine().create(template, IndexMap::from([("weight".to_string(), Value::Number(weight))])).unwrap()
    }

    fn total(world: &World, id: EntityId) -> f64 {
        world.entities.get(id).and_then(|e| e.get("totalWeight")).and_then(Value::as_number).unwrap_or(f64::NAN)
    }

    #[test]
    fn test_move_writes_each_ancestor_once() {
        let mut world = World::new();
        let (item, container) = (item(), container());
        let room = weighted(&mut world, container.clone(), 0.0);
        let chest = weighted(&mut world, container.clone(), 10.0);
        let bag = weighted(&mut world, container.clone(), 1.0);
        let pouch = weighted(&mut world, container.clone(), 0.5);
        let gem = weighted(&mut world, item.clone(), 0.1);
        let sword = weighted(&mut world, item.clone(), 3.0);
        let tome = weighted(&mut world, item, 5.0);

        world.engine().set(pouch, "inventory", Value::from(vec![gem])).unwrap();
        world.engine().set(bag, "inventory", Value::from(vec![tome])).unwrap();
        world.engine().set(chest, "inventory", Value::from(vec![pouch, sword])).unwrap();
        world.engine().set(room, "inventory", Value::from(vec![chest, bag])).unwrap();
        assert!((total(&world, room) - 19.6).abs() < 1e-9);

        let before = world.journal.writes().count();
        world.engine().set(gem, "owner", Value::from(bag)).unwrap();

        let slot = container.attr_index("totalWeight").unwrap();
        let writes = |id: EntityId| world.journal.writes().skip(before).filter(|w| *w == (id, slot)).count();
        assert_eq!(writes(pouch), 1);
        assert_eq!(writes(chest), 1);
        assert_eq!(writes(bag), 1);
        assert!(writes(room) <= 1);

        assert!((total(&world, pouch) - 0.5).abs() < 1e-9);
        assert!((total(&world, chest) - 13.5).abs() < 1e-9);
        assert!((total(&world, bag) - 6.1).abs() < 1e-9);
        assert!((total(&world, room) - 19.6).abs() < 1e-9);
    }

    #[test]
    fn test_nan_assignment_is_idempotent() {
        let mut world = World::new();
        let roller = template(
            "roller",
            vec![("x", AttrSchema::of_type(Number)), ("roll", AttrSchema::calc(Number, "1d1000000 + min(x, 0)"))],
        );
        let id = world.engine().create(roller, IndexMap::new()).unwrap();
        world.engine().set(id, "x", Value::Number(f64::NAN)).unwrap();
        let rolled = world.entities.get(id).and_then(|e| e.get("roll")).cloned();
        let before = world.journal.len();

        world.engine().set(id, "x", Value::Number(f64::NAN)).unwrap();
        assert_eq!(world.journal.len(), before);
        assert_eq!(world.entities.get(id).and_then(|e| e.get("roll")).cloned(), rolled);
    }

    #[test]
    fn test_cascade_limit_is_opt_in() {
        let mut world = World::new();
        let (item, container) = (item(), container());
        let outer = weighted(&mut world, container.clone(), 1.0);
        let inner = weighted(&mut world, container, 1.0);
        let gem = weighted(&mut world, item, 1.0);
        world.engine().set(outer, "inventory", Value::from(vec![inner])).unwrap();

        world.journal = Ledger::new();
        world.config.max_cascade_rounds = Some(1);
        let err = world.engine().set(inner, "inventory", Value::from(vec![gem])).unwrap_err();
        assert!(matches!(err, RulebookError::CascadeLimit { rounds: 1, .. }));
        std::mem::take(&mut world.journal).rollback(&mut world.entities);
        assert_eq!(world.entities.get(inner).and_then(|e| e.get("inventory")), Some(&Value::EntityList(vec![])));

        world.config.max_cascade_rounds = None;
        world.engine().set(gem, "weight", Value::Number(2.0)).unwrap();
        assert!((total(&world, gem) - 2.0).abs() < 1e-9);
    }
}
