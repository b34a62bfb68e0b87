//! Method-by-method translation into target instructions.
//!
//! The translator walks one source method at a time, dispatching each
//! opcode through the selector. Emission goes into a per-method buffer
//! with method-relative addresses; branches get placeholder immediates
//! resolved at the end of the method, internal calls get call-fix markers
//! resolved by the module linker.
//!
//! # Module Organization
//!
//! - `context`: the per-method cursor and branch map, with the snapshot
//!   pair used around speculative compilation
//! - `frame`: locals/arguments emulated as one alt-stack-resident array
//! - `structs`: struct and array emulation, including literal folding
//! - `calls`: call-site classification and calling-convention emission
//! - `selector`: the per-opcode dispatch table

mod calls;
mod context;
mod frame;
mod selector;
mod structs;

#[cfg(test)]
mod calls_tests;

use indexmap::IndexMap;
use tarn_bytecode::{CallConvention, CompiledMethod, Insn};

pub(crate) use calls::CallKind;
pub(crate) use context::TranslationContext;

use crate::error::TranslateError;
use crate::il::{SourceMethod, SourceModule};

/// Translates source methods into compiled methods, discovery order
/// preserved.
pub struct Translator<'a> {
    pub(crate) src: &'a SourceModule,
    pub(crate) convention: CallConvention,
    /// Compiled methods in discovery order. An in-progress method holds a
    /// placeholder entry so recursive call sites resolve by name instead
    /// of descending forever.
    pub(crate) methods: IndexMap<String, CompiledMethod>,
    pub(crate) ctx: TranslationContext,
}

impl<'a> Translator<'a> {
    pub fn new(src: &'a SourceModule, convention: CallConvention) -> Self {
        Self {
            src,
            convention,
            methods: IndexMap::new(),
            ctx: TranslationContext::default(),
        }
    }

    /// Translate every emittable method in the source module, in table
    /// order. Methods already pulled in speculatively are not retranslated.
    pub fn translate_all(&mut self) -> Result<(), TranslateError> {
        let src = self.src;
        for (name, method) in &src.methods {
            let attrs = &method.attrs;
            // Marker-only and extern declarations produce no code of their
            // own; their call sites carry the emission.
            if attrs.no_emit
                || attrs.syscall.is_some()
                || attrs.op_alias.is_some()
                || attrs.appcall.is_some()
            {
                continue;
            }
            if self.methods.contains_key(name) {
                continue;
            }
            self.translate_method(name)?;
        }
        Ok(())
    }

    /// The finished method table, for linking.
    pub fn into_methods(self) -> IndexMap<String, CompiledMethod> {
        self.methods
    }

    /// Translate one method and merge it into the method table.
    pub(crate) fn translate_method(&mut self, name: &str) -> Result<(), TranslateError> {
        if self.methods.contains_key(name) {
            return Ok(());
        }
        let src = self.src;
        let Some(method) = src.find_method(name) else {
            return Err(TranslateError::UnresolvedCall {
                target: name.to_owned(),
            });
        };

        // Placeholder keeps the discovery-order slot and cuts off
        // recursive speculation into this same method.
        self.methods
            .insert(name.to_owned(), CompiledMethod::default());
        self.ctx.reset();

        let insns = self.translate_body(method)?;
        let compiled = CompiledMethod {
            name: method.name.clone(),
            display_name: method.display_name().to_owned(),
            is_public: method.is_public,
            is_entry: method.is_entry,
            params: method.params.clone(),
            returns: method.returns,
            entry: 0,
            insns,
        };
        self.methods.insert(name.to_owned(), compiled);
        Ok(())
    }

    fn translate_body(&mut self, method: &SourceMethod) -> Result<Vec<Insn>, TranslateError> {
        let mut out = Vec::with_capacity(method.body.len() * 2);
        self.emit_prologue(method, &mut out);

        let body = &method.body;
        let mut i = 0;
        while i < body.len() {
            let insn = &body[i];
            self.ctx.branch_map.insert(insn.addr, self.ctx.addr);
            let skip = self
                .translate_instruction(method, body, i, &mut out)
                .map_err(|e| e.in_method(&method.name, insn))?;
            i += 1 + skip;
        }

        self.resolve_branches(method, &mut out)?;
        Ok(out)
    }

    /// Assign the cursor address and append.
    pub(crate) fn emit(&mut self, out: &mut Vec<Insn>, mut insn: Insn) {
        insn.addr = self.ctx.addr;
        self.ctx.addr += insn.encoded_len();
        out.push(insn);
    }

    /// Per-method linking: patch every branch-fix against the branch map.
    fn resolve_branches(
        &self,
        method: &SourceMethod,
        insns: &mut [Insn],
    ) -> Result<(), TranslateError> {
        for insn in insns.iter_mut() {
            let Some(target) = insn.branch_fix else {
                continue;
            };
            let Some(&dest) = self.ctx.branch_map.get(&target) else {
                return Err(TranslateError::InMethod {
                    method: method.name.clone(),
                    insn: self.branch_source(method, insn.addr),
                    source: Box::new(TranslateError::UnresolvedBranch { target }),
                });
            };
            let offset = i64::from(dest) - i64::from(insn.addr);
            let Ok(offset) = i16::try_from(offset) else {
                return Err(TranslateError::InMethod {
                    method: method.name.clone(),
                    insn: self.branch_source(method, insn.addr),
                    source: Box::new(TranslateError::BranchOverflow { offset }),
                });
            };
            insn.patch_branch(offset);
        }
        Ok(())
    }

    /// Render the source instruction that emitted the branch at `addr`:
    /// the one whose recorded emission start is the greatest at or below
    /// it. Ties from non-emitting predecessors resolve to the latest
    /// source address, which is the branch itself.
    fn branch_source(&self, method: &SourceMethod, addr: u32) -> String {
        self.ctx
            .branch_map
            .iter()
            .filter(|&(_, &emitted)| emitted <= addr)
            .max_by_key(|&(&src, &emitted)| (emitted, src))
            .and_then(|(&src, _)| method.body.iter().find(|s| s.addr == src))
            .map_or_else(|| format!("{addr:#06x}"), ToString::to_string)
    }

    /// Compile a callee discovered mid-translation.
    ///
    /// The enclosing method's cursor and branch map are snapshotted before
    /// the attempt and restored unconditionally; a failed attempt also
    /// discards the callee's placeholder so nothing partial is merged.
    pub(crate) fn speculate(&mut self, name: &str) -> bool {
        if self.methods.contains_key(name) {
            return true;
        }
        if self.src.find_method(name).is_none() {
            return false;
        }
        let snapshot = self.ctx.snapshot();
        let ok = self.translate_method(name).is_ok();
        self.ctx.restore(snapshot);
        if !ok {
            self.methods.shift_remove(name);
        }
        ok
    }
}
