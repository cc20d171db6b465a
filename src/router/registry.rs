// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use super::types::{RuleId, TypeSet};
use super::value::{parse_value, ValueType};
use crate::road::{RegionId, RoutingRegion, TagValue};

/// Interning table assigning dense [RuleIds](RuleId) to every [TagValue]
/// seen by a [GeneralRouter](super::GeneralRouter).
///
/// The table is append-only: ids are assigned in registration order, starting from zero,
/// and never change or get reused. For every tag name, the registry also keeps a mask
/// of all ids sharing that name, which allows checking for a tag regardless of its value.
///
/// Registration requires exclusive access (`&mut self`); sharing a registry between
/// concurrent route calculations requires external synchronization.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    ids: HashMap<TagValue, RuleId>,
    by_id: Vec<TagValue>,
    masks: HashMap<String, TypeSet>,
    region_convert: HashMap<RegionId, HashMap<u32, RuleId>>,
    parsed: HashMap<(RuleId, ValueType), Option<f64>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned tag-value pairs.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Returns the id of the provided tag and value, interning the pair if necessary.
    pub fn register(&mut self, tag: &str, value: &str) -> RuleId {
        let key = TagValue::new(tag, value);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }

        let id = RuleId::new(self.by_id.len() as u32);
        self.by_id.push(key.clone());
        self.ids.insert(key, id);
        self.masks.entry(tag.to_string()).or_default().insert(id);
        return id;
    }

    /// Returns the id of an already interned tag and value.
    pub fn get(&self, tag: &str, value: &str) -> Option<RuleId> {
        self.ids.get(&TagValue::new(tag, value)).cloned()
    }

    pub fn tag_value(&self, id: RuleId) -> Option<&TagValue> {
        self.by_id.get(id.index())
    }

    /// Returns the set of all ids with the provided tag name.
    pub fn mask(&self, tag: &str) -> Option<&TypeSet> {
        self.masks.get(tag)
    }

    /// Checks if `types` contain any value of the provided tag.
    pub fn has_tag(&self, tag: &str, types: &TypeSet) -> bool {
        self.mask(tag).map(|m| m.intersects(types)).unwrap_or(false)
    }

    /// Returns the lowest id in `types` with the provided tag name.
    pub fn find_tag(&self, tag: &str, types: &TypeSet) -> Option<RuleId> {
        self.mask(tag)?.first_common(types)
    }

    /// Converts raw type codes of a road (or a road point) from the provided region
    /// into a [TypeSet], interning unseen tags on the way.
    ///
    /// Raw code to id mappings are cached per region. Codes missing from the region's
    /// decoding table indicate mismatched data and are skipped.
    pub fn convert(&mut self, region: &RoutingRegion, codes: &[u32]) -> TypeSet {
        let mut result = TypeSet::new();

        // Temporarily take the region cache to allow calling self.register
        let mut cache = self.region_convert.remove(&region.id()).unwrap_or_default();

        for &code in codes {
            let id = match cache.get(&code) {
                Some(&id) => id,
                None => match region.decode(code) {
                    Some(tv) => {
                        let id = self.register(&tv.tag, &tv.value);
                        cache.insert(code, id);
                        id
                    }
                    None => {
                        log::error!(
                            "type code {} is missing from the decoding table of region {}",
                            code,
                            region.name(),
                        );
                        continue;
                    }
                },
            };
            result.insert(id);
        }

        self.region_convert.insert(region.id(), cache);
        return result;
    }

    /// Parses the value of an interned tag, memoizing the result.
    pub fn parse_tag_value(&mut self, id: RuleId, value_type: ValueType) -> Option<f64> {
        if let Some(&parsed) = self.parsed.get(&(id, value_type)) {
            return parsed;
        }

        let parsed = self
            .by_id
            .get(id.index())
            .and_then(|tv| parse_value(&tv.value, value_type));
        self.parsed.insert((id, value_type), parsed);
        return parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_almost_eq;

    #[test]
    fn register_is_deterministic() {
        let mut r = TagRegistry::new();
        let a = r.register("highway", "primary");
        let b = r.register("highway", "secondary");
        let c = r.register("oneway", "yes");

        assert_eq!(r.register("highway", "primary"), a);
        assert_eq!(r.register("oneway", "yes"), c);
        assert_eq!([a.index(), b.index(), c.index()], [0, 1, 2]);
        assert_eq!(r.len(), 3);
        assert_eq!(r.tag_value(b), Some(&TagValue::new("highway", "secondary")));
    }

    #[test]
    fn masks_cover_every_id_once() {
        let mut r = TagRegistry::new();
        let pairs = [
            ("highway", "primary"),
            ("oneway", "yes"),
            ("highway", "service"),
            ("maxspeed", "50"),
            ("oneway", "-1"),
        ];
        for (k, v) in pairs {
            r.register(k, v);
        }

        for idx in 0..r.len() {
            let id = RuleId::new(idx as u32);
            let tag = &r.tag_value(id).unwrap().tag;
            for name in ["highway", "oneway", "maxspeed"] {
                assert_eq!(r.mask(name).unwrap().contains(id), name == tag);
            }
        }
        assert_eq!(r.mask("highway").unwrap().len(), 2);
    }

    #[test]
    fn convert_uses_region_table() {
        let mut region = RoutingRegion::new("test");
        let code_oneway = region.encode("oneway", "yes");
        let code_highway = region.encode("highway", "motorway");

        let mut r = TagRegistry::new();
        let pre = r.register("highway", "motorway");

        let types = r.convert(&region, &[code_highway, code_oneway]);
        assert_eq!(types.len(), 2);
        assert!(types.contains(pre));
        assert!(types.contains(r.get("oneway", "yes").unwrap()));

        // second conversion hits the cache and interns nothing new
        let again = r.convert(&region, &[code_oneway]);
        assert_eq!(r.len(), 2);
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn convert_skips_unknown_codes() {
        let region = RoutingRegion::new("empty");
        let mut r = TagRegistry::new();
        assert!(r.convert(&region, &[7]).is_empty());
    }

    #[test]
    fn tag_lookup() {
        let mut r = TagRegistry::new();
        let speed = r.register("maxspeed", "50");
        let hw = r.register("highway", "primary");
        let types: TypeSet = [speed, hw].into_iter().collect();

        assert!(r.has_tag("maxspeed", &types));
        assert!(!r.has_tag("lanes", &types));
        assert_eq!(r.find_tag("maxspeed", &types), Some(speed));
        assert_almost_eq!(r.parse_tag_value(speed, ValueType::Speed).unwrap(), 13.8889);
        assert_almost_eq!(r.parse_tag_value(speed, ValueType::Number).unwrap(), 50.0);
        assert_eq!(r.parse_tag_value(hw, ValueType::Number), None);
    }
}
