//! Contract ABI tables.
//!
//! A [`ContractAbi`] is the data that replaces a generated binding class:
//! functions, events, custom errors and the constructor, indexed by name
//! and by selector / topic. It loads from standard Solidity ABI JSON or from
//! a list of human-readable declarations.

use alloy_primitives::B256;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::call::{build_call, decode_input, decode_return, encode_constructor, DecodedCall, EncodedCall};
use crate::error::AbiError;
use crate::event::{decode_log, DecodedEvent, Log};
use crate::selector::selector_hex;
use crate::signature::{EventParam, EventSignature, FunctionSignature, Param, StateMutability};
use crate::types::{AbiType, AbiValue};

#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: Vec<FunctionSignature>,
    events: Vec<EventSignature>,
    errors: Vec<FunctionSignature>,
    constructor: Option<Vec<Param>>,
    by_selector: IndexMap<[u8; 4], usize>,
    by_topic: IndexMap<B256, usize>,
    errors_by_selector: IndexMap<[u8; 4], usize>,
}

impl ContractAbi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load standard Solidity ABI JSON (an array of entries).
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let items: Vec<JsonItem> =
            serde_json::from_str(json).map_err(|e| AbiError::InvalidAbiJson(e.to_string()))?;
        let mut abi = Self::new();
        for item in items {
            item.add_to(&mut abi)?;
        }
        Ok(abi)
    }

    /// Build from human-readable declarations. Events, errors and the
    /// constructor need their keyword; anything else is a function.
    ///
    /// ```text
    /// constructor(string name, string symbol)
    /// function balanceOf(address owner) view returns (uint256)
    /// event Transfer(address indexed from, address indexed to, uint256 value)
    /// error Unauthorized(address caller)
    /// ```
    pub fn from_signatures<S: AsRef<str>>(decls: &[S]) -> Result<Self, AbiError> {
        let mut abi = Self::new();
        for decl in decls {
            let decl = decl.as_ref().trim();
            if decl.starts_with("event ") {
                abi.add_event(EventSignature::parse(decl)?);
            } else if let Some(rest) = decl.strip_prefix("error ") {
                abi.add_error(FunctionSignature::parse(rest)?);
            } else if let Some(rest) = decl.strip_prefix("constructor") {
                // Reuse the function parser on a placeholder name.
                let sig = FunctionSignature::parse(&format!("constructor{rest}"))?;
                abi.constructor = Some(sig.inputs().to_vec());
            } else {
                abi.add_function(FunctionSignature::parse(decl)?);
            }
        }
        Ok(abi)
    }

    /// Register a function. A later entry with the same selector replaces
    /// the earlier one in the selector index.
    pub fn add_function(&mut self, sig: FunctionSignature) {
        self.by_selector.insert(sig.selector(), self.functions.len());
        self.functions.push(sig);
    }

    pub fn add_event(&mut self, sig: EventSignature) {
        if !sig.is_anonymous() {
            self.by_topic.insert(sig.topic(), self.events.len());
        }
        self.events.push(sig);
    }

    pub fn add_error(&mut self, sig: FunctionSignature) {
        self.errors_by_selector.insert(sig.selector(), self.errors.len());
        self.errors.push(sig);
    }

    pub fn set_constructor(&mut self, inputs: Vec<Param>) {
        self.constructor = Some(inputs);
    }

    pub fn functions(&self) -> &[FunctionSignature] {
        &self.functions
    }

    pub fn events(&self) -> &[EventSignature] {
        &self.events
    }

    pub fn errors(&self) -> &[FunctionSignature] {
        &self.errors
    }

    /// Look a function up by plain name (first overload wins) or by
    /// canonical signature such as `transfer(address,uint256)`.
    pub fn function(&self, name: &str) -> Result<&FunctionSignature, AbiError> {
        let found = if name.contains('(') {
            self.functions.iter().find(|f| f.canonical() == name)
        } else {
            self.functions.iter().find(|f| f.name() == name)
        };
        found.ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Every overload named `name`.
    pub fn overloads<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionSignature> + 'a {
        self.functions.iter().filter(move |f| f.name() == name)
    }

    pub fn function_by_selector(&self, selector: [u8; 4]) -> Option<&FunctionSignature> {
        self.by_selector.get(&selector).map(|i| &self.functions[*i])
    }

    /// Look an event up by plain name or canonical signature.
    pub fn event(&self, name: &str) -> Result<&EventSignature, AbiError> {
        let found = if name.contains('(') {
            self.events.iter().find(|e| e.canonical() == name)
        } else {
            self.events.iter().find(|e| e.name() == name)
        };
        found.ok_or_else(|| AbiError::UnknownEvent(name.to_string()))
    }

    pub fn event_by_topic(&self, topic: B256) -> Option<&EventSignature> {
        self.by_topic.get(&topic).map(|i| &self.events[*i])
    }

    pub fn error_by_selector(&self, selector: [u8; 4]) -> Option<&FunctionSignature> {
        self.errors_by_selector.get(&selector).map(|i| &self.errors[*i])
    }

    pub fn constructor(&self) -> Option<&[Param]> {
        self.constructor.as_deref()
    }

    /// Constructor input types; empty when the ABI declares no constructor.
    pub fn constructor_types(&self) -> Vec<AbiType> {
        self.constructor
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| p.ty.clone())
            .collect()
    }

    /// Encode a call to the function `name`.
    pub fn encode_call(&self, name: &str, args: &[AbiValue]) -> Result<EncodedCall, AbiError> {
        Ok(build_call(self.function(name)?, args)?)
    }

    /// Decode the return data of the function `name`.
    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
        Ok(decode_return(data, &self.function(name)?.output_types())?)
    }

    /// Deployment payload for `bytecode` with constructor `args`.
    pub fn encode_deploy(&self, bytecode: &[u8], args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
        Ok(encode_constructor(bytecode, &self.constructor_types(), args)?)
    }

    /// Decode transaction calldata by its selector.
    pub fn decode_method(&self, calldata: &[u8]) -> Result<DecodedCall, AbiError> {
        let selector = leading_selector(calldata)
            .ok_or_else(|| AbiError::UnknownSelector(format!("0x{}", hex::encode(calldata))))?;
        let sig = self
            .function_by_selector(selector)
            .ok_or_else(|| AbiError::UnknownSelector(selector_hex(selector)))?;
        decode_input(sig, calldata)
    }

    /// Decode revert data as one of the declared custom errors.
    pub fn decode_error(&self, data: &[u8]) -> Option<DecodedCall> {
        let sig = self.error_by_selector(leading_selector(data)?)?;
        decode_input(sig, data).ok()
    }

    /// Decode a log by its signature topic. Anonymous events are never
    /// matched this way.
    pub fn decode_log(&self, log: &Log) -> Result<DecodedEvent, AbiError> {
        let topic = log
            .topics
            .first()
            .ok_or_else(|| AbiError::UnknownEvent("log without topics".into()))?;
        let sig = self
            .event_by_topic(*topic)
            .ok_or_else(|| AbiError::UnknownEvent(format!("{topic:#x}")))?;
        decode_log(log, sig)
    }
}

fn leading_selector(data: &[u8]) -> Option<[u8; 4]> {
    let head = data.get(..4)?;
    let mut selector = [0u8; 4];
    selector.copy_from_slice(head);
    Some(selector)
}

// ─── JSON ABI ─────────────────────────────────────────────────────────────────

fn default_item_type() -> String {
    "function".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonItem {
    #[serde(rename = "type", default = "default_item_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<JsonParam>,
    #[serde(default)]
    outputs: Vec<JsonParam>,
    #[serde(default)]
    state_mutability: Option<StateMutability>,
    #[serde(default)]
    anonymous: bool,
    // Pre-0.5 compilers emit these instead of `stateMutability`.
    #[serde(default)]
    constant: bool,
    #[serde(default)]
    payable: bool,
}

#[derive(Debug, Deserialize)]
struct JsonParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<JsonParam>,
    #[serde(default)]
    indexed: bool,
}

impl JsonParam {
    fn resolve(&self) -> Result<AbiType, AbiError> {
        let spelling = match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let members = self
                    .components
                    .iter()
                    .map(|c| c.resolve().map(|t| t.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("({}){suffix}", members.join(","))
            }
            None => self.ty.clone(),
        };
        spelling
            .parse()
            .map_err(|e: crate::error::EncodeError| AbiError::InvalidAbiJson(format!("{}: {e}", self.ty)))
    }

    fn param(&self) -> Result<Param, AbiError> {
        Ok(Param::new(self.name.clone(), self.resolve()?))
    }
}

impl JsonItem {
    fn state_mutability(&self) -> StateMutability {
        match self.state_mutability {
            Some(m) => m,
            None if self.constant => StateMutability::View,
            None if self.payable => StateMutability::Payable,
            None => StateMutability::NonPayable,
        }
    }

    fn add_to(self, abi: &mut ContractAbi) -> Result<(), AbiError> {
        let params = |list: &[JsonParam]| list.iter().map(JsonParam::param).collect::<Result<Vec<_>, _>>();
        match self.kind.as_str() {
            "function" => {
                let sig = FunctionSignature::from_params(
                    self.name.clone(),
                    params(&self.inputs)?,
                    params(&self.outputs)?,
                    self.state_mutability(),
                )?;
                abi.add_function(sig);
            }
            "event" => {
                let event_params = self
                    .inputs
                    .iter()
                    .map(|p| Ok(EventParam::new(p.name.clone(), p.resolve()?, p.indexed)))
                    .collect::<Result<Vec<_>, AbiError>>()?;
                abi.add_event(EventSignature::from_params(
                    self.name.clone(),
                    event_params,
                    self.anonymous,
                )?);
            }
            "error" => {
                let sig = FunctionSignature::from_params(
                    self.name.clone(),
                    params(&self.inputs)?,
                    Vec::new(),
                    StateMutability::NonPayable,
                )?;
                abi.add_error(sig);
            }
            "constructor" => abi.set_constructor(params(&self.inputs)?),
            "fallback" | "receive" => {}
            other => return Err(AbiError::InvalidAbiJson(format!("unknown entry type `{other}`"))),
        }
        Ok(())
    }
}
