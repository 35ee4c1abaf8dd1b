//! Scenario graphs.
//!
//! A scenario is authored as a directed graph of dialogue nodes: choice
//! nodes offer scored reply options, response nodes carry the persona's
//! fixed line and point at the next choice node or at the completion
//! sentinel. Graphs are validated once at load time and immutable after;
//! every runtime lookup is a keyed O(1) access against the validated map.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EngineError, EngineResult};

/// Node key every conversation starts at.
pub const START_NODE_KEY: &str = "start";

/// Reserved node reference marking the end of a conversation.
pub const COMPLETION_SENTINEL: &str = "complete";

/// Conversational tone of the trainee's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Warm, informal phrasing.
    Friendly,
    /// Measured, formal phrasing.
    Professional,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Friendly => write!(f, "friendly"),
            Tone::Professional => write!(f, "professional"),
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "friendly" => Ok(Tone::Friendly),
            "professional" => Ok(Tone::Professional),
            _ => Err(format!("Unknown tone: {}", s)),
        }
    }
}

/// Intensity level of a persona trait adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitLevel {
    /// Low trait expression.
    Low,
    /// High trait expression.
    High,
}

impl fmt::Display for TraitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitLevel::Low => write!(f, "low"),
            TraitLevel::High => write!(f, "high"),
        }
    }
}

impl FromStr for TraitLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TraitLevel::Low),
            "high" => Ok(TraitLevel::High),
            _ => Err(format!("Unknown trait level: {}", s)),
        }
    }
}

/// OCEAN personality trait of a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OceanTrait {
    /// Openness to experience.
    Openness,
    /// Conscientiousness.
    Conscientiousness,
    /// Extraversion.
    Extraversion,
    /// Agreeableness.
    Agreeableness,
    /// Neuroticism.
    Neuroticism,
}

impl fmt::Display for OceanTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OceanTrait::Openness => write!(f, "openness"),
            OceanTrait::Conscientiousness => write!(f, "conscientiousness"),
            OceanTrait::Extraversion => write!(f, "extraversion"),
            OceanTrait::Agreeableness => write!(f, "agreeableness"),
            OceanTrait::Neuroticism => write!(f, "neuroticism"),
        }
    }
}

impl FromStr for OceanTrait {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openness" => Ok(OceanTrait::Openness),
            "conscientiousness" => Ok(OceanTrait::Conscientiousness),
            "extraversion" => Ok(OceanTrait::Extraversion),
            "agreeableness" => Ok(OceanTrait::Agreeableness),
            "neuroticism" => Ok(OceanTrait::Neuroticism),
            _ => Err(format!("Unknown OCEAN trait: {}", s)),
        }
    }
}

/// OCEAN trait values for a persona, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OceanTraits {
    /// Openness value.
    pub openness: u8,
    /// Conscientiousness value.
    pub conscientiousness: u8,
    /// Extraversion value.
    pub extraversion: u8,
    /// Agreeableness value.
    pub agreeableness: u8,
    /// Neuroticism value.
    pub neuroticism: u8,
}

/// The persona the trainee converses with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaMetadata {
    /// Display name.
    pub name: String,
    /// Short role descriptor (e.g. "Frustrated Customer").
    pub role: String,
    /// Ticket/call identifier referenced in the dialogue.
    pub call_id: String,
    /// Product/service area of the scenario.
    pub service: String,
    /// One-line subject of the contact.
    pub subject: String,
    /// Briefing notes shown to the trainee.
    pub notes: String,
    /// OCEAN trait values rendered in the persona panel.
    pub ocean: OceanTraits,
}

/// Variant key selecting one of the 8 authored phrasings of an option:
/// tone crossed with the scenario's primary and secondary trait levels.
///
/// Serialized as the literal `"{tone}-{primary}-{secondary}"` string, which
/// is also the key format of the relational variant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantKey {
    /// Reply tone.
    pub tone: Tone,
    /// Level of the scenario's primary trait.
    pub primary: TraitLevel,
    /// Level of the scenario's secondary trait.
    pub secondary: TraitLevel,
}

impl VariantKey {
    /// Create a variant key.
    pub fn new(tone: Tone, primary: TraitLevel, secondary: TraitLevel) -> Self {
        Self {
            tone,
            primary,
            secondary,
        }
    }

    /// All 8 keys of the variant space.
    pub fn all() -> [VariantKey; 8] {
        let mut keys = [VariantKey::new(Tone::Friendly, TraitLevel::Low, TraitLevel::Low); 8];
        let mut i = 0;
        for tone in [Tone::Friendly, Tone::Professional] {
            for primary in [TraitLevel::Low, TraitLevel::High] {
                for secondary in [TraitLevel::Low, TraitLevel::High] {
                    keys[i] = VariantKey::new(tone, primary, secondary);
                    i += 1;
                }
            }
        }
        keys
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.tone, self.primary, self.secondary)
    }
}

impl FromStr for VariantKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(format!("Unknown variant key: {}", s));
        }
        Ok(VariantKey {
            tone: parts[0].parse()?,
            primary: parts[1].parse()?,
            secondary: parts[2].parse()?,
        })
    }
}

impl Serialize for VariantKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VariantKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(DeError::custom)
    }
}

/// Per-choice score deltas along the three assessment axes.
///
/// Authored content keeps every axis within [-1, 2]; the range is enforced
/// at graph load, not by the accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDelta {
    /// Clarity adjustment.
    pub clarity: i32,
    /// Friendliness adjustment.
    pub friendly: i32,
    /// Empathy adjustment.
    pub empathy: i32,
}

/// The 8-way table of authored phrasings for one option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantTable(HashMap<VariantKey, String>);

impl VariantTable {
    /// Look up the phrasing for a variant key.
    pub fn get(&self, key: &VariantKey) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Keys of the variant space that are absent or blank.
    pub fn missing_keys(&self) -> Vec<VariantKey> {
        VariantKey::all()
            .into_iter()
            .filter(|key| self.get(key).map_or(true, |text| text.trim().is_empty()))
            .collect()
    }
}

impl FromIterator<(VariantKey, String)> for VariantTable {
    fn from_iter<I: IntoIterator<Item = (VariantKey, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Reference to the next node in the graph, or the completion sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The conversation ends here.
    Complete,
    /// The conversation continues at the named node.
    Node(String),
}

impl NodeRef {
    /// Whether this reference is the completion sentinel.
    pub fn is_complete(&self) -> bool {
        matches!(self, NodeRef::Complete)
    }

    /// The referenced node key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            NodeRef::Complete => None,
            NodeRef::Node(key) => Some(key),
        }
    }
}

impl From<String> for NodeRef {
    fn from(s: String) -> Self {
        if s == COMPLETION_SENTINEL {
            NodeRef::Complete
        } else {
            NodeRef::Node(s)
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Complete => write!(f, "{}", COMPLETION_SENTINEL),
            NodeRef::Node(key) => write!(f, "{}", key),
        }
    }
}

impl Serialize for NodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(NodeRef::from(String::deserialize(deserializer)?))
    }
}

/// One selectable reply at a choice node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueOption {
    /// Author-assigned key, unique within the node.
    pub key: String,
    /// Display order within the node.
    #[serde(default)]
    pub order_index: i64,
    /// Score deltas applied when this option is chosen.
    pub scores: ScoreDelta,
    /// The response node this choice leads to.
    pub next: NodeRef,
    /// The 8 authored phrasings of this reply.
    pub text: VariantTable,
}

impl DialogueOption {
    /// Resolve the phrasing for a variant key, failing when the table does
    /// not carry it.
    pub fn variant_text(&self, key: VariantKey) -> EngineResult<&str> {
        self.text
            .get(&key)
            .ok_or_else(|| EngineError::VariantNotFound {
                variant_key: key.to_string(),
                option_key: self.key.clone(),
            })
    }
}

/// A node offering the trainee a set of scored reply options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceNode {
    /// Node key, unique within the scenario.
    pub key: String,
    /// Depth in the authored tree (informational, not control flow).
    #[serde(default)]
    pub level: i64,
    /// The options offered at this node.
    pub options: Vec<DialogueOption>,
}

impl ChoiceNode {
    /// Find an option by its author key.
    pub fn option(&self, option_key: &str) -> Option<&DialogueOption> {
        self.options.iter().find(|opt| opt.key == option_key)
    }
}

/// A node carrying the persona's fixed line and the follow-up reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseNode {
    /// Node key, unique within the scenario.
    pub key: String,
    /// The line spoken by the persona.
    pub content: String,
    /// The next choice node, or the completion sentinel.
    pub next: NodeRef,
}

/// A dialogue node: either a choice or a persona response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum Node {
    /// A choice node.
    Choice(ChoiceNode),
    /// A response node.
    Response(ResponseNode),
}

impl Node {
    /// The node's key.
    pub fn key(&self) -> &str {
        match self {
            Node::Choice(node) => &node.key,
            Node::Response(node) => &node.key,
        }
    }
}

/// Raw, unvalidated scenario content as authored in a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Stable scenario identifier.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Icon name used by the client.
    #[serde(default)]
    pub icon: Option<String>,
    /// Position in the scenario listing.
    #[serde(default)]
    pub order_index: i64,
    /// The OCEAN trait the primary variant level maps to.
    pub primary_trait: OceanTrait,
    /// The OCEAN trait the secondary variant level maps to.
    pub secondary_trait: OceanTrait,
    /// Persona briefing.
    pub persona: PersonaMetadata,
    /// System framing for the scenario.
    pub system_message: String,
    /// The persona's first line, shown before any selection.
    pub opening_message: String,
    /// The dialogue graph nodes.
    pub nodes: Vec<Node>,
}

/// A validated, immutable scenario graph with O(1) node lookup.
#[derive(Debug, Clone)]
pub struct ScenarioGraph {
    /// Stable scenario identifier.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Icon name used by the client.
    pub icon: Option<String>,
    /// Position in the scenario listing.
    pub order_index: i64,
    /// The OCEAN trait the primary variant level maps to.
    pub primary_trait: OceanTrait,
    /// The OCEAN trait the secondary variant level maps to.
    pub secondary_trait: OceanTrait,
    /// Persona briefing.
    pub persona: PersonaMetadata,
    /// System framing for the scenario.
    pub system_message: String,
    /// The persona's first line.
    pub opening_message: String,
    nodes: HashMap<String, Node>,
}

impl ScenarioGraph {
    /// Validate a raw spec into a usable graph.
    ///
    /// Every violation here is fatal for the scenario: dangling references,
    /// empty choice nodes, incomplete variant tables, out-of-range score
    /// deltas, and wrong node types behind a reference all reject the
    /// content before it can be offered to users.
    pub fn load(spec: ScenarioSpec) -> EngineResult<Self> {
        let mut nodes = HashMap::with_capacity(spec.nodes.len());
        for node in spec.nodes {
            let key = node.key().to_string();
            if key == COMPLETION_SENTINEL {
                return Err(integrity(format!(
                    "node key {} collides with the completion sentinel",
                    key
                )));
            }
            if nodes.insert(key.clone(), node).is_some() {
                return Err(integrity(format!("duplicate node key: {}", key)));
            }
        }

        let graph = Self {
            slug: spec.slug,
            title: spec.title,
            icon: spec.icon,
            order_index: spec.order_index,
            primary_trait: spec.primary_trait,
            secondary_trait: spec.secondary_trait,
            persona: spec.persona,
            system_message: spec.system_message,
            opening_message: spec.opening_message,
            nodes,
        };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> EngineResult<()> {
        match self.nodes.get(START_NODE_KEY) {
            Some(Node::Choice(_)) => {}
            Some(Node::Response(_)) => {
                return Err(integrity(format!(
                    "node {} must be a choice node",
                    START_NODE_KEY
                )));
            }
            None => {
                return Err(integrity(format!("missing {} node", START_NODE_KEY)));
            }
        }

        for node in self.nodes.values() {
            match node {
                Node::Choice(choice) => self.validate_choice(choice)?,
                Node::Response(response) => self.validate_response(response)?,
            }
        }
        Ok(())
    }

    fn validate_choice(&self, choice: &ChoiceNode) -> EngineResult<()> {
        if choice.options.is_empty() {
            return Err(integrity(format!("choice node {} has no options", choice.key)));
        }

        let mut seen = HashMap::new();
        for option in &choice.options {
            if seen.insert(option.key.as_str(), ()).is_some() {
                return Err(integrity(format!(
                    "duplicate option key {} in node {}",
                    option.key, choice.key
                )));
            }

            let missing = option.text.missing_keys();
            if !missing.is_empty() {
                return Err(integrity(format!(
                    "option {} in node {} is missing text variants: {}",
                    option.key,
                    choice.key,
                    missing
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }

            for (axis, value) in [
                ("clarity", option.scores.clarity),
                ("friendly", option.scores.friendly),
                ("empathy", option.scores.empathy),
            ] {
                if !(-1..=2).contains(&value) {
                    return Err(integrity(format!(
                        "option {} in node {} has {} delta {} outside [-1, 2]",
                        option.key, choice.key, axis, value
                    )));
                }
            }

            match &option.next {
                NodeRef::Complete => {
                    return Err(integrity(format!(
                        "option {} in node {} must lead to a response node, not completion",
                        option.key, choice.key
                    )));
                }
                NodeRef::Node(next_key) => match self.nodes.get(next_key) {
                    Some(Node::Response(_)) => {}
                    Some(Node::Choice(_)) => {
                        return Err(integrity(format!(
                            "option {} in node {} references choice node {}, expected a response node",
                            option.key, choice.key, next_key
                        )));
                    }
                    None => {
                        return Err(integrity(format!(
                            "option {} in node {} references unknown node {}",
                            option.key, choice.key, next_key
                        )));
                    }
                },
            }
        }
        Ok(())
    }

    fn validate_response(&self, response: &ResponseNode) -> EngineResult<()> {
        match &response.next {
            NodeRef::Complete => Ok(()),
            NodeRef::Node(next_key) => match self.nodes.get(next_key) {
                Some(Node::Choice(_)) => Ok(()),
                Some(Node::Response(_)) => Err(integrity(format!(
                    "response node {} references response node {}, expected a choice node",
                    response.key, next_key
                ))),
                None => Err(integrity(format!(
                    "response node {} references unknown node {}",
                    response.key, next_key
                ))),
            },
        }
    }

    /// Keyed node lookup.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over all nodes in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Look up a node expected to be a choice node.
    pub fn choice(&self, key: &str) -> EngineResult<&ChoiceNode> {
        match self.nodes.get(key) {
            Some(Node::Choice(node)) => Ok(node),
            Some(Node::Response(_)) => Err(integrity(format!(
                "node {} is a response node, expected a choice node",
                key
            ))),
            None => Err(integrity(format!("node {} does not exist", key))),
        }
    }

    /// Look up a node expected to be a response node.
    pub fn response(&self, key: &str) -> EngineResult<&ResponseNode> {
        match self.nodes.get(key) {
            Some(Node::Response(node)) => Ok(node),
            Some(Node::Choice(_)) => Err(integrity(format!(
                "node {} is a choice node, expected a response node",
                key
            ))),
            None => Err(integrity(format!("node {} does not exist", key))),
        }
    }
}

fn integrity(message: String) -> EngineError {
    EngineError::Integrity { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variants(prefix: &str) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for key in VariantKey::all() {
            map.insert(key.to_string(), json!(format!("{} ({})", prefix, key)));
        }
        serde_json::Value::Object(map)
    }

    fn minimal_spec() -> serde_json::Value {
        json!({
            "slug": "demo",
            "title": "Demo",
            "order_index": 0,
            "primary_trait": "agreeableness",
            "secondary_trait": "neuroticism",
            "persona": {
                "name": "Claudia",
                "role": "Frustrated Customer",
                "call_id": "123456",
                "service": "Billing",
                "subject": "Refund Request",
                "notes": "Upset about an unexpected charge.",
                "ocean": {
                    "openness": 45,
                    "conscientiousness": 60,
                    "extraversion": 55,
                    "agreeableness": 30,
                    "neuroticism": 70
                }
            },
            "system_message": "You are speaking with Claudia.",
            "opening_message": "I need to talk to someone about billing #123456.",
            "nodes": [
                {
                    "node_type": "choice",
                    "key": "start",
                    "level": 0,
                    "options": [
                        {
                            "key": "opt_0_a",
                            "order_index": 0,
                            "scores": { "clarity": 1, "friendly": 0, "empathy": 0 },
                            "next": "response_1",
                            "text": variants("check the charge")
                        }
                    ]
                },
                {
                    "node_type": "response",
                    "key": "response_1",
                    "content": "Okay, thank you.",
                    "next": "complete"
                }
            ]
        })
    }

    fn load(value: serde_json::Value) -> EngineResult<ScenarioGraph> {
        let spec: ScenarioSpec = serde_json::from_value(value).expect("spec should deserialize");
        ScenarioGraph::load(spec)
    }

    #[test]
    fn test_variant_key_roundtrip() {
        for key in VariantKey::all() {
            let parsed: VariantKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
        assert_eq!(
            VariantKey::new(Tone::Professional, TraitLevel::High, TraitLevel::Low).to_string(),
            "professional-high-low"
        );
        assert!("friendly-low".parse::<VariantKey>().is_err());
        assert!("casual-low-low".parse::<VariantKey>().is_err());
    }

    #[test]
    fn test_node_ref_sentinel() {
        assert!(NodeRef::from("complete".to_string()).is_complete());
        let node = NodeRef::from("choice_1".to_string());
        assert!(!node.is_complete());
        assert_eq!(node.key(), Some("choice_1"));
    }

    #[test]
    fn test_load_valid_graph() {
        let graph = load(minimal_spec()).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(matches!(graph.get("start"), Some(Node::Choice(_))));
        let choice = graph.choice("start").unwrap();
        let text = choice.options[0]
            .variant_text(VariantKey::new(Tone::Friendly, TraitLevel::Low, TraitLevel::High))
            .unwrap();
        assert!(text.contains("friendly-low-high"));
    }

    #[test]
    fn test_load_rejects_missing_start() {
        let mut spec = minimal_spec();
        spec["nodes"][0]["key"] = json!("opening");
        spec["nodes"][0]["options"][0]["next"] = json!("response_1");
        let err = load(spec).unwrap_err();
        assert!(err.to_string().contains("missing start node"));
    }

    #[test]
    fn test_load_rejects_dangling_reference() {
        let mut spec = minimal_spec();
        spec["nodes"][1]["next"] = json!("choice_9");
        let err = load(spec).unwrap_err();
        assert!(err.to_string().contains("unknown node choice_9"));
    }

    #[test]
    fn test_load_rejects_incomplete_variant_table() {
        let mut spec = minimal_spec();
        spec["nodes"][0]["options"][0]["text"]
            .as_object_mut()
            .unwrap()
            .remove("professional-high-high");
        let err = load(spec).unwrap_err();
        assert!(err.to_string().contains("professional-high-high"));
    }

    #[test]
    fn test_load_rejects_out_of_range_delta() {
        let mut spec = minimal_spec();
        spec["nodes"][0]["options"][0]["scores"]["empathy"] = json!(3);
        let err = load(spec).unwrap_err();
        assert!(err.to_string().contains("outside [-1, 2]"));
    }

    #[test]
    fn test_load_rejects_option_jumping_to_completion() {
        let mut spec = minimal_spec();
        spec["nodes"][0]["options"][0]["next"] = json!("complete");
        let err = load(spec).unwrap_err();
        assert!(err.to_string().contains("not completion"));
    }

    #[test]
    fn test_variant_text_missing_at_call_time() {
        let option = DialogueOption {
            key: "opt_0_a".to_string(),
            order_index: 0,
            scores: ScoreDelta::default(),
            next: NodeRef::Node("response_1".to_string()),
            text: VariantTable::default(),
        };
        let err = option
            .variant_text(VariantKey::new(Tone::Friendly, TraitLevel::Low, TraitLevel::Low))
            .unwrap_err();
        assert!(matches!(err, EngineError::VariantNotFound { .. }));
    }
}

