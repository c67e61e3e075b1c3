//! Feature registries.
//!
//! [`FeatureRegistry`] is the per-device table `feature → (internal state, public view)`.
//! Entries are created lazily the first time a feature is asked for and are never
//! replaced afterwards, so every view handed out for one feature on one device
//! shares the same state cell.
//!
//! [`MappedFeatureRegistry`] adds, per feature, the adapter's parameters (raw axis
//! index, byte offset, bit index…) and an updater that recomputes the internal
//! state from the adapter's freshly polled raw data. Mappings are declared once
//! inside [`DeviceAdapter::init_adapter`](crate::adapter::DeviceAdapter::init_adapter)
//! and sealed afterwards.
//!
//! Registries are owned by one device and only touched from the thread polling
//! it; the table itself has no locking.

use crate::error::RegistryError;
use crate::feature::{Feature, FeatureKey, FeatureKind, FeatureState, StateCell};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One feature bound to one device instance.
struct RegisteredFeature {
    id: &'static str,
    kind: FeatureKind,
    /// `StateCell<S>` behind `Any`.
    internal: Box<dyn Any + Send + Sync>,
    /// `S::View` behind `Any`.
    view: Box<dyn Any + Send + Sync>,
}

/// Lazily populated table of per-device feature states.
#[derive(Default)]
pub struct FeatureRegistry {
    entries: HashMap<FeatureKey, RegisteredFeature>,
    absent: HashMap<FeatureKey, &'static str>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that this device never has `feature`; later lookups fail with
    /// [`RegistryError::UnsupportedFeature`].
    ///
    /// A feature that is already registered stays registered for the device's
    /// lifetime; the declaration is ignored and `false` is returned.
    pub fn declare_absent<S: FeatureState>(&mut self, feature: &'static Feature<S>) -> bool {
        let key = feature.key();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.absent.insert(key, feature.id());
        true
    }

    pub fn is_absent<S: FeatureState>(&self, feature: &'static Feature<S>) -> bool {
        self.absent.contains_key(&feature.key())
    }

    /// Public view of `feature`, creating its state on first use.
    pub fn state<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<S::View, RegistryError> {
        let entry = self.entry(feature)?;
        entry
            .view
            .downcast_ref::<S::View>()
            .cloned()
            .ok_or(RegistryError::StateTypeMismatch(feature.id()))
    }

    /// Internal state cell of `feature`, creating it on first use.
    pub fn internal<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<StateCell<S>, RegistryError> {
        let entry = self.entry(feature)?;
        entry
            .internal
            .downcast_ref::<StateCell<S>>()
            .cloned()
            .ok_or(RegistryError::StateTypeMismatch(feature.id()))
    }

    /// View of `feature` if it has already been registered. Never creates an entry.
    pub fn peek<S: FeatureState>(&self, feature: &'static Feature<S>) -> Option<S::View> {
        self.entries
            .get(&feature.key())
            .and_then(|e| e.view.downcast_ref::<S::View>())
            .cloned()
    }

    pub fn contains<S: FeatureState>(&self, feature: &'static Feature<S>) -> bool {
        self.entries.contains_key(&feature.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(id, kind)` of every registered feature, sorted by id.
    pub fn features(&self) -> Vec<(&'static str, FeatureKind)> {
        let mut out: Vec<_> = self.entries.values().map(|e| (e.id, e.kind)).collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    fn entry<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<&RegisteredFeature, RegistryError> {
        let key = feature.key();
        if self.absent.contains_key(&key) {
            return Err(RegistryError::UnsupportedFeature(feature.id()));
        }
        Ok(self.entries.entry(key).or_insert_with(|| {
            let cell: StateCell<S> = Arc::new(RwLock::new(feature.default_state()));
            let view = feature.derive_view(&cell);
            RegisteredFeature {
                id: feature.id(),
                kind: feature.kind(),
                internal: Box::new(cell),
                view: Box::new(view),
            }
        }))
    }
}

type Updater<R> = Box<dyn FnMut(&R) + Send>;

struct Mapping<R> {
    id: &'static str,
    update: Updater<R>,
}

/// Registry plus the adapter's feature mappings over raw data of type `R`.
pub struct MappedFeatureRegistry<R> {
    registry: FeatureRegistry,
    mappings: Vec<Mapping<R>>,
    mapped: HashSet<FeatureKey>,
    required: Vec<(FeatureKey, &'static str)>,
    sealed: bool,
}

impl<R> Default for MappedFeatureRegistry<R> {
    fn default() -> Self {
        Self {
            registry: FeatureRegistry::new(),
            mappings: Vec::new(),
            mapped: HashSet::new(),
            required: Vec::new(),
            sealed: false,
        }
    }
}

impl<R: 'static> MappedFeatureRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `feature` to adapter `params` and an `updater` run on every poll.
    ///
    /// Returns the feature's internal state cell so output-style features
    /// (rumble, LEDs, cursor requests) can be read back by the adapter.
    pub fn map_feature<S, P, U>(
        &mut self,
        feature: &'static Feature<S>,
        params: P,
        mut updater: U,
    ) -> Result<StateCell<S>, RegistryError>
    where
        S: FeatureState,
        P: Send + 'static,
        U: FnMut(&mut S, &P, &R) + Send + 'static,
    {
        if self.sealed {
            return Err(RegistryError::MappingSealed(feature.id()));
        }
        let key = feature.key();
        if self.mapped.contains(&key) {
            return Err(RegistryError::DuplicateMapping(feature.id()));
        }
        let cell = self.registry.internal(feature)?;
        let target = cell.clone();
        self.mapped.insert(key);
        self.mappings.push(Mapping {
            id: feature.id(),
            update: Box::new(move |raw: &R| {
                let mut state = target.write();
                updater(&mut *state, &params, raw);
            }),
        });
        Ok(cell)
    }

    pub fn has_mapping<S: FeatureState>(&self, feature: &'static Feature<S>) -> bool {
        self.mapped.contains(&feature.key())
    }

    /// Mark `feature` as mandatory: sealing fails if it was never mapped.
    pub fn require<S: FeatureState>(&mut self, feature: &'static Feature<S>) {
        self.required.push((feature.key(), feature.id()));
    }

    /// Freeze the mapping table and check mandatory features.
    pub fn seal(&mut self) -> Result<(), RegistryError> {
        if let Some((_, id)) = self
            .required
            .iter()
            .find(|(key, _)| !self.mapped.contains(key))
        {
            return Err(RegistryError::UnmappedFeature(*id));
        }
        self.sealed = true;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Run every updater against `raw`, in mapping order.
    pub fn update_all(&mut self, raw: &R) {
        for mapping in &mut self.mappings {
            (mapping.update)(raw);
        }
    }

    /// Ids of mapped features, in mapping order.
    pub fn mapped_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.mappings.iter().map(|m| m.id)
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FeatureRegistry {
        &mut self.registry
    }

    /// Shorthand for `registry_mut().state(feature)`.
    pub fn state<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<S::View, RegistryError> {
        self.registry.state(feature)
    }

    pub fn declare_absent<S: FeatureState>(&mut self, feature: &'static Feature<S>) -> bool {
        self.registry.declare_absent(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ButtonState, StickState, TriggerState};
    use proptest::prelude::*;

    static FIRE: Feature<ButtonState> = Feature::new("test.fire", FeatureKind::Button);
    static JUMP: Feature<ButtonState> = Feature::new("test.jump", FeatureKind::Button);
    static AIM: Feature<StickState> = Feature::new("test.aim", FeatureKind::Stick);
    static THROTTLE: Feature<TriggerState> = Feature::new("test.throttle", FeatureKind::Trigger);

    #[test]
    fn lazy_single_creation() {
        let mut reg = FeatureRegistry::new();
        assert!(!reg.contains(&FIRE));
        let a = reg.state(&FIRE).unwrap();
        let b = reg.state(&FIRE).unwrap();
        assert!(a.shares_state_with(&b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn absent_feature_is_unsupported() {
        let mut reg = FeatureRegistry::new();
        reg.declare_absent(&AIM);
        assert_eq!(
            reg.state(&AIM).unwrap_err(),
            RegistryError::UnsupportedFeature("test.aim")
        );
        // unknown-but-not-absent features still get a default entry
        assert_eq!(reg.state(&THROTTLE).unwrap().value(), 0.0);
    }

    #[test]
    fn registered_feature_cannot_become_absent() {
        let mut reg = FeatureRegistry::new();
        let view = reg.state(&FIRE).unwrap();
        assert!(!reg.declare_absent(&FIRE));
        assert!(!reg.is_absent(&FIRE));
        assert!(reg.state(&FIRE).unwrap().shares_state_with(&view));
    }

    #[test]
    fn peek_does_not_create() {
        let reg = FeatureRegistry::new();
        assert!(reg.peek(&FIRE).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn updaters_see_raw_data() {
        let mut mapped: MappedFeatureRegistry<Vec<bool>> = MappedFeatureRegistry::new();
        mapped
            .map_feature(&FIRE, 1usize, |s: &mut ButtonState, idx: &usize, raw: &Vec<bool>| {
                s.pressed = raw[*idx];
            })
            .unwrap();
        let view = mapped.state(&FIRE).unwrap();

        mapped.update_all(&vec![false, true]);
        assert!(view.is_pressed());
        mapped.update_all(&vec![false, false]);
        assert!(!view.is_pressed());
    }

    #[test]
    fn duplicate_mapping_rejected() {
        let mut mapped: MappedFeatureRegistry<()> = MappedFeatureRegistry::new();
        mapped.map_feature(&FIRE, (), |_, _, _| {}).unwrap();
        assert!(mapped.has_mapping(&FIRE));
        let err = mapped.map_feature(&FIRE, (), |_, _, _| {}).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateMapping("test.fire"));
    }

    #[test]
    fn sealed_registry_rejects_new_mappings() {
        let mut mapped: MappedFeatureRegistry<()> = MappedFeatureRegistry::new();
        mapped.seal().unwrap();
        assert_eq!(
            mapped.map_feature(&JUMP, (), |_, _, _| {}).unwrap_err(),
            RegistryError::MappingSealed("test.jump")
        );
    }

    #[test]
    fn mandatory_feature_without_mapping_fails_seal() {
        let mut mapped: MappedFeatureRegistry<()> = MappedFeatureRegistry::new();
        mapped.require(&JUMP);
        mapped.map_feature(&FIRE, (), |_, _, _| {}).unwrap();
        assert_eq!(
            mapped.seal().unwrap_err(),
            RegistryError::UnmappedFeature("test.jump")
        );
        assert!(!mapped.is_sealed());
    }

    #[test]
    fn mapping_absent_feature_fails() {
        let mut mapped: MappedFeatureRegistry<()> = MappedFeatureRegistry::new();
        mapped.declare_absent(&AIM);
        assert_eq!(
            mapped.map_feature(&AIM, (), |_, _, _| {}).unwrap_err(),
            RegistryError::UnsupportedFeature("test.aim")
        );
    }

    #[test]
    fn view_before_mapping_shares_mapped_state() {
        let mut mapped: MappedFeatureRegistry<bool> = MappedFeatureRegistry::new();
        let early = mapped.state(&FIRE).unwrap();
        mapped
            .map_feature(&FIRE, (), |s: &mut ButtonState, _: &(), raw: &bool| s.pressed = *raw)
            .unwrap();
        mapped.update_all(&true);
        assert!(early.is_pressed());
    }

    proptest! {
        #[test]
        fn second_mapping_always_fails(order in proptest::collection::vec(0usize..3, 1..12)) {
            let features: [&'static Feature<ButtonState>; 3] = [&FIRE, &JUMP, &crate::catalog::gamepad::SOUTH];
            let mut mapped: MappedFeatureRegistry<()> = MappedFeatureRegistry::new();
            let mut seen = std::collections::HashSet::new();
            for i in order {
                let result = mapped.map_feature(features[i], (), |_, _, _| {});
                if seen.insert(i) {
                    prop_assert!(result.is_ok());
                } else {
                    prop_assert_eq!(result.unwrap_err(), RegistryError::DuplicateMapping(features[i].id()));
                }
            }
        }
    }
}
