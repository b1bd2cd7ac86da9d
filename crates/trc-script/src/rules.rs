//! Line-oriented rule scripts.
//!
//! A script is a list of statements, one per line:
//!
//! - `require <field>`: the context must carry `<field>`.
//! - `label <field> [as <key>]`: copy a context field into the result.
//! - `on <event> <count|collect|sum|last> <field> [as <key>]`: aggregate an
//!   event field. Rules sharing a key and aggregate share one accumulator.
//! - `return <key>`: the result is that key's value instead of an object.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::debug;
use trc_collect::{
    BalanceChange, CallExit, CallFrame, ContextField, Result, StopHandle, Step, StorageAccess,
    TraceContext, TraceError, Tracer, TxEnv, TxOutcome, hex_address, hex_bytes, hex_quantity,
    hex_word,
};

use crate::ScriptEngine;

static REQUIRE_PATTERN: OnceLock<Regex> = OnceLock::new();
static LABEL_PATTERN: OnceLock<Regex> = OnceLock::new();
static RULE_PATTERN: OnceLock<Regex> = OnceLock::new();
static RETURN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, re: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(re).expect("statement pattern is valid"))
}

/// Fields that can be summed; all are `u64`.
const SUMMABLE: &[&str] = &["gas", "gas_cost", "gas_used", "pc", "depth"];

/// Event a rule listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    TxStart,
    TxEnd,
    Enter,
    Exit,
    Step,
    Storage,
    Balance,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TxStart => "tx_start",
            Self::TxEnd => "tx_end",
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Step => "step",
            Self::Storage => "storage",
            Self::Balance => "balance",
        }
    }

    /// Field names available on this event.
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::TxStart => &[
                "from",
                "to",
                "input",
                "value",
                "gas",
                "selector",
                "selector_size",
            ],
            Self::Enter => &[
                "type",
                "from",
                "to",
                "input",
                "value",
                "gas",
                "depth",
                "selector",
                "selector_size",
            ],
            Self::TxEnd | Self::Exit => &["gas_used", "output", "error"],
            Self::Step => &["pc", "op", "gas", "gas_cost", "depth"],
            Self::Storage => &["address", "slot", "value", "is_write"],
            Self::Balance => &["address", "before", "after"],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tx_start" => Ok(Self::TxStart),
            "tx_end" => Ok(Self::TxEnd),
            "enter" => Ok(Self::Enter),
            "exit" => Ok(Self::Exit),
            "step" => Ok(Self::Step),
            "storage" => Ok(Self::Storage),
            "balance" => Ok(Self::Balance),
            other => Err(format!("unknown event '{other}'")),
        }
    }
}

/// How a rule folds the values it sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    /// Occurrences per distinct value.
    Count,
    /// Every value, in order.
    Collect,
    /// Numeric total.
    Sum,
    /// Last value seen.
    Last,
}

impl Aggregate {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Collect => "collect",
            Self::Sum => "sum",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "collect" => Ok(Self::Collect),
            "sum" => Ok(Self::Sum),
            "last" => Ok(Self::Last),
            other => Err(format!("unknown aggregate '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
struct Rule {
    event: EventKind,
    field: &'static str,
    /// Index into `Program::outputs`.
    slot: usize,
}

#[derive(Clone, Debug)]
struct Output {
    key: String,
    aggregate: Aggregate,
}

/// A parsed script, ready to be bound to a context.
#[derive(Clone, Debug, Default)]
pub struct Program {
    requires: Vec<ContextField>,
    labels: Vec<(ContextField, String)>,
    rules: Vec<Rule>,
    outputs: Vec<Output>,
    returns: Option<usize>,
}

impl Program {
    /// Number of aggregation rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn key_taken(&self, key: &str) -> bool {
        self.labels.iter().any(|(_, k)| k == key) || self.outputs.iter().any(|o| o.key == key)
    }

    fn output_slot(
        &mut self,
        key: &str,
        aggregate: Aggregate,
    ) -> std::result::Result<usize, String> {
        if let Some(idx) = self.outputs.iter().position(|o| o.key == key) {
            let existing = self.outputs[idx].aggregate;
            if existing != aggregate {
                return Err(format!("key '{key}' already holds a {existing} aggregate"));
            }
            return Ok(idx);
        }
        if self.key_taken(key) {
            return Err(format!("key '{key}' is already a label"));
        }
        self.outputs.push(Output {
            key: key.to_string(),
            aggregate,
        });
        Ok(self.outputs.len() - 1)
    }

    fn parse_line(
        &mut self,
        line: &str,
        returns: &mut Option<String>,
    ) -> std::result::Result<(), String> {
        let require = pattern(&REQUIRE_PATTERN, r"^require\s+(\w+)$");
        let label = pattern(&LABEL_PATTERN, r"^label\s+(\w+)(?:\s+as\s+(\w+))?$");
        let rule = pattern(&RULE_PATTERN, r"^on\s+(\w+)\s+(\w+)\s+(\w+)(?:\s+as\s+(\w+))?$");
        let ret = pattern(&RETURN_PATTERN, r"^return\s+(\w+)$");

        if let Some(caps) = require.captures(line) {
            self.requires.push(caps[1].parse()?);
        } else if let Some(caps) = label.captures(line) {
            let field: ContextField = caps[1].parse()?;
            let key = caps.get(2).map_or(field.as_str(), |m| m.as_str());
            if self.key_taken(key) {
                return Err(format!("duplicate key '{key}'"));
            }
            self.labels.push((field, key.to_string()));
        } else if let Some(caps) = rule.captures(line) {
            let event: EventKind = caps[1].parse()?;
            let aggregate: Aggregate = caps[2].parse()?;
            let name = &caps[3];
            let field = event
                .fields()
                .iter()
                .copied()
                .find(|f| *f == name)
                .ok_or_else(|| format!("event '{event}' has no field '{name}'"))?;
            if aggregate == Aggregate::Sum && !SUMMABLE.contains(&field) {
                return Err(format!("field '{field}' is not numeric"));
            }
            let key = caps
                .get(4)
                .map_or_else(|| format!("{aggregate}_{event}_{field}"), |m| m.as_str().to_string());
            let slot = self.output_slot(&key, aggregate)?;
            self.rules.push(Rule { event, field, slot });
        } else if let Some(caps) = ret.captures(line) {
            if returns.is_some() {
                return Err("only one return statement is allowed".to_string());
            }
            *returns = Some(caps[1].to_string());
        } else {
            return Err(format!("unrecognized statement '{line}'"));
        }
        Ok(())
    }

    /// Bind the program to a context, producing a fresh tracer.
    pub fn bind(&self, ctx: &TraceContext) -> Result<RuleTracer> {
        if let Some(missing) = self.requires.iter().find(|f| ctx.field(**f).is_none()) {
            return Err(TraceError::binding(missing.as_str()));
        }
        let mut labels = Map::new();
        for (field, key) in &self.labels {
            let value = ctx
                .field(*field)
                .ok_or_else(|| TraceError::binding(field.as_str()))?;
            labels.insert(key.clone(), value);
        }
        Ok(RuleTracer {
            rules: self.rules.clone(),
            keys: self.outputs.iter().map(|o| o.key.clone()).collect(),
            accumulators: self
                .outputs
                .iter()
                .map(|o| Accumulator::new(o.aggregate))
                .collect(),
            labels,
            returns: self.returns,
            stop: StopHandle::new(),
        })
    }
}

impl FromStr for Program {
    type Err = TraceError;

    fn from_str(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(TraceError::compile("empty tracer source"));
        }
        let mut program = Self::default();
        let mut returns = None;
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }
            program
                .parse_line(line, &mut returns)
                .map_err(|msg| TraceError::compile(format!("line {}: {msg}", idx + 1)))?;
        }
        if let Some(key) = returns {
            let slot = program
                .outputs
                .iter()
                .position(|o| o.key == key)
                .ok_or_else(|| TraceError::compile(format!("return of unknown key '{key}'")))?;
            program.returns = Some(slot);
        }
        Ok(program)
    }
}

#[derive(Debug)]
enum Accumulator {
    Count(BTreeMap<String, u64>),
    Collect(Vec<Value>),
    Sum(u64),
    Last(Option<Value>),
}

impl Accumulator {
    const fn new(aggregate: Aggregate) -> Self {
        match aggregate {
            Aggregate::Count => Self::Count(BTreeMap::new()),
            Aggregate::Collect => Self::Collect(Vec::new()),
            Aggregate::Sum => Self::Sum(0),
            Aggregate::Last => Self::Last(None),
        }
    }

    fn add(&mut self, value: Value) {
        match self {
            Self::Count(counts) => *counts.entry(count_key(&value)).or_default() += 1,
            Self::Collect(items) => items.push(value),
            Self::Sum(total) => *total = total.saturating_add(value.as_u64().unwrap_or_default()),
            Self::Last(last) => *last = Some(value),
        }
    }

    fn finish(&self) -> Value {
        match self {
            Self::Count(counts) => Value::Object(
                counts
                    .iter()
                    .map(|(k, n)| (k.clone(), Value::from(*n)))
                    .collect(),
            ),
            Self::Collect(items) => Value::Array(items.clone()),
            Self::Sum(total) => Value::from(*total),
            Self::Last(last) => last.clone().unwrap_or(Value::Null),
        }
    }
}

fn count_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tracer running a bound [`Program`].
#[derive(Debug)]
pub struct RuleTracer {
    rules: Vec<Rule>,
    keys: Vec<String>,
    accumulators: Vec<Accumulator>,
    labels: Map<String, Value>,
    returns: Option<usize>,
    stop: StopHandle,
}

impl RuleTracer {
    fn observe(&mut self, event: EventKind, extract: impl Fn(&str) -> Option<Value>) {
        if self.stop.is_stopped() {
            return;
        }
        for rule in self.rules.iter().filter(|r| r.event == event) {
            if let Some(value) = extract(rule.field) {
                self.accumulators[rule.slot].add(value);
            }
        }
    }
}

impl Tracer for RuleTracer {
    fn on_tx_start(&mut self, tx: &TxEnv) {
        self.observe(EventKind::TxStart, |f| tx_start_field(tx, f));
    }

    fn on_tx_end(&mut self, outcome: &TxOutcome) {
        self.observe(EventKind::TxEnd, |f| {
            exit_field(outcome.gas_used, &outcome.output, outcome.error.as_ref(), f)
        });
    }

    fn on_enter(&mut self, frame: &CallFrame) {
        self.observe(EventKind::Enter, |f| frame_field(frame, f));
    }

    fn on_exit(&mut self, exit: &CallExit) {
        self.observe(EventKind::Exit, |f| {
            exit_field(exit.gas_used, &exit.output, exit.error.as_ref(), f)
        });
    }

    fn on_step(&mut self, step: &Step) {
        self.observe(EventKind::Step, |f| step_field(step, f));
    }

    fn on_storage(&mut self, access: &StorageAccess) {
        self.observe(EventKind::Storage, |f| storage_field(access, f));
    }

    fn on_balance(&mut self, change: &BalanceChange) {
        self.observe(EventKind::Balance, |f| balance_field(change, f));
    }

    fn result(&mut self) -> Result<Value> {
        self.stop.check()?;
        if let Some(slot) = self.returns {
            return Ok(self.accumulators[slot].finish());
        }
        let mut out = self.labels.clone();
        for (key, acc) in self.keys.iter().zip(&self.accumulators) {
            out.insert(key.clone(), acc.finish());
        }
        Ok(Value::Object(out))
    }

    fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}

fn selector(input: &[u8]) -> Option<String> {
    input.get(..4).map(hex_bytes)
}

fn selector_size(input: &[u8]) -> Option<String> {
    selector(input).map(|s| format!("{s}-{}", input.len() - 4))
}

fn tx_start_field(tx: &TxEnv, field: &str) -> Option<Value> {
    match field {
        "from" => Some(hex_address(&tx.from).into()),
        "to" => tx.to.as_ref().map(|to| hex_address(to).into()),
        "input" => Some(hex_bytes(&tx.input).into()),
        "value" => Some(hex_quantity(tx.value).into()),
        "gas" => Some(tx.gas.into()),
        "selector" => tx.to.and(selector(&tx.input)).map(Into::into),
        "selector_size" => tx.to.and(selector_size(&tx.input)).map(Into::into),
        _ => None,
    }
}

fn frame_field(frame: &CallFrame, field: &str) -> Option<Value> {
    let call_input = (!frame.kind.is_create()).then_some(&frame.input[..]);
    match field {
        "type" => Some(frame.kind.as_str().into()),
        "from" => Some(hex_address(&frame.from).into()),
        "to" => Some(hex_address(&frame.to).into()),
        "input" => Some(hex_bytes(&frame.input).into()),
        "value" => Some(hex_quantity(frame.value).into()),
        "gas" => Some(frame.gas.into()),
        "depth" => Some(frame.depth.into()),
        "selector" => call_input.and_then(selector).map(Into::into),
        "selector_size" => call_input.and_then(selector_size).map(Into::into),
        _ => None,
    }
}

fn exit_field(gas_used: u64, output: &[u8], error: Option<&String>, field: &str) -> Option<Value> {
    match field {
        "gas_used" => Some(gas_used.into()),
        "output" => Some(hex_bytes(output).into()),
        "error" => error.map(|e| e.clone().into()),
        _ => None,
    }
}

fn step_field(step: &Step, field: &str) -> Option<Value> {
    match field {
        "pc" => Some(step.pc.into()),
        "op" => Some(step.op.clone().into()),
        "gas" => Some(step.gas.into()),
        "gas_cost" => Some(step.gas_cost.into()),
        "depth" => Some(step.depth.into()),
        _ => None,
    }
}

fn storage_field(access: &StorageAccess, field: &str) -> Option<Value> {
    match field {
        "address" => Some(hex_address(&access.address).into()),
        "slot" => Some(hex_word(&access.slot).into()),
        "value" => Some(hex_word(&access.value).into()),
        "is_write" => Some(access.is_write.into()),
        _ => None,
    }
}

fn balance_field(change: &BalanceChange, field: &str) -> Option<Value> {
    match field {
        "address" => Some(hex_address(&change.address).into()),
        "before" => Some(hex_quantity(change.before).into()),
        "after" => Some(hex_quantity(change.after).into()),
        _ => None,
    }
}

/// Engine for rule scripts.
#[derive(Clone, Debug, Default)]
pub struct RuleEngine {
    /// Parsed programs keyed by source text.
    cache: FxHashMap<String, Program>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-parse `sources` so instantiating them skips parsing.
    ///
    /// Sources that fail to parse are left out and fail again on use.
    #[must_use]
    pub fn with_warm_cache<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        let cache = sources
            .into_iter()
            .filter_map(|src| Some((src.to_string(), src.parse().ok()?)))
            .collect();
        Self { cache }
    }

    /// Parse `source` without binding it.
    pub fn compile(&self, source: &str) -> Result<Program> {
        match self.cache.get(source) {
            Some(program) => Ok(program.clone()),
            None => source.parse(),
        }
    }
}

impl ScriptEngine for RuleEngine {
    fn instantiate(&self, source: &str, ctx: &TraceContext) -> Result<Box<dyn Tracer>> {
        let program = self.compile(source)?;
        debug!(rules = program.rule_count(), "instantiating script tracer");
        Ok(Box::new(program.bind(ctx)?))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256, Bytes};
    use serde_json::json;
    use trc_collect::{CallKind, StopReason};

    use super::*;

    fn call(input: &'static [u8], kind: CallKind) -> CallFrame {
        CallFrame {
            kind,
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            input: Bytes::from_static(input),
            ..CallFrame::default()
        }
    }

    fn step(op: &str, gas_cost: u64) -> Step {
        Step {
            op: op.to_string(),
            gas_cost,
            ..Step::default()
        }
    }

    fn instantiate(source: &str, ctx: &TraceContext) -> Result<Box<dyn Tracer>> {
        RuleEngine::new().instantiate(source, ctx)
    }

    fn compile_error(source: &str) -> String {
        match source.parse::<Program>() {
            Err(TraceError::Compile { diagnostic }) => diagnostic,
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_count_and_sum() {
        let mut tracer = instantiate(
            "on step count op as ops\non step sum gas_cost",
            &TraceContext::default(),
        )
        .unwrap();
        tracer.on_step(&step("PUSH1", 3));
        tracer.on_step(&step("PUSH1", 3));
        tracer.on_step(&step("SSTORE", 20_000));
        assert_eq!(
            tracer.result().unwrap(),
            json!({ "ops": { "PUSH1": 2, "SSTORE": 1 }, "sum_step_gas_cost": 20_006 })
        );
    }

    #[test]
    fn test_selector_size_skips_creates_and_short_input() {
        let source = "on enter count selector_size as s\nreturn s";
        let mut tracer = instantiate(source, &TraceContext::default()).unwrap();
        tracer.on_enter(&call(&[0xa9, 0x05, 0x9c, 0xbb, 0, 0], CallKind::Call));
        tracer.on_enter(&call(&[0xa9, 0x05, 0x9c, 0xbb, 0, 0], CallKind::StaticCall));
        tracer.on_enter(&call(&[0x60, 0x80, 0x60, 0x40], CallKind::Create));
        tracer.on_enter(&call(&[0x01], CallKind::Call));
        assert_eq!(tracer.result().unwrap(), json!({ "0xa9059cbb-2": 2 }));
    }

    #[test]
    fn test_collect_and_last() {
        let source = "on storage collect slot as slots\non exit last error as lastError";
        let mut tracer = instantiate(source, &TraceContext::default()).unwrap();
        tracer.on_storage(&StorageAccess {
            slot: B256::with_last_byte(1),
            ..StorageAccess::default()
        });
        tracer.on_exit(&CallExit::default());
        tracer.on_exit(&CallExit {
            error: Some("revert".into()),
            ..CallExit::default()
        });
        let result = tracer.result().unwrap();
        assert_eq!(result["slots"].as_array().unwrap().len(), 1);
        assert_eq!(result["lastError"], "revert");
    }

    #[test]
    fn test_require_and_label_bind_context() {
        let source = "require tx_index\nlabel block_number as block";
        let err = instantiate(source, &TraceContext::default()).err().unwrap();
        assert_eq!(err, TraceError::binding("tx_index"));

        let ctx = TraceContext {
            tx_index: Some(0),
            ..TraceContext::default()
        };
        let err = instantiate(source, &ctx).err().unwrap();
        assert_eq!(err, TraceError::binding("block_number"));

        let ctx = TraceContext::block(9, B256::ZERO).with_tx(0, None);
        let mut tracer = instantiate(source, &ctx).unwrap();
        assert_eq!(tracer.result().unwrap(), json!({ "block": 9 }));
    }

    #[test]
    fn test_compile_errors_name_the_line() {
        assert_eq!(compile_error("   \n"), "empty tracer source");
        assert!(compile_error("// ok\n{ step: function() {} }").starts_with("line 2:"));
        assert!(compile_error("on step count selector").contains("no field 'selector'"));
        assert!(compile_error("on step average gas").contains("unknown aggregate"));
        assert!(compile_error("on jump count pc").contains("unknown event"));
        assert!(compile_error("on step sum op").contains("not numeric"));
        assert!(compile_error("require gas").contains("unknown context field"));
        assert!(
            compile_error("on step count op as x\non step sum gas as x").contains("already holds")
        );
        assert!(
            compile_error("label tx_index as x\non step count op as x").contains("already a label")
        );
        assert!(compile_error("on step count op\nreturn nothing").contains("unknown key"));
    }

    #[test]
    fn test_comment_only_script_is_valid() {
        let mut tracer = instantiate("# nothing here", &TraceContext::default()).unwrap();
        assert_eq!(tracer.result().unwrap(), json!({}));
    }

    #[test]
    fn test_stop_reports_cancelled() {
        let mut tracer = instantiate("on step count op", &TraceContext::default()).unwrap();
        tracer.on_step(&step("ADD", 3));
        tracer.stop(StopReason::Interrupted("client went away".into()));
        tracer.on_step(&step("ADD", 3));
        let err = tracer.result().unwrap_err();
        assert_eq!(
            err.stop_reason(),
            Some(&StopReason::Interrupted("client went away".into()))
        );
    }

    #[test]
    fn test_warm_cache_matches_fresh_parse() {
        let source = "on step count op";
        let engine = RuleEngine::with_warm_cache([source, "not a script"]);
        assert_eq!(engine.cache.len(), 1);
        assert_eq!(engine.compile(source).unwrap().rule_count(), 1);
        assert!(engine.compile("not a script").is_err());
    }
}
