//! Module-wide address linking.
//!
//! Second pass over the translated method table: pick the designated
//! entry method, lay every method out in one contiguous address space
//! (entry first, then discovery order), rewrite instruction addresses
//! from method-relative to absolute, and patch every call-fix marker
//! against the now-known entry addresses.

use indexmap::IndexMap;
use tarn_bytecode::{CallConvention, CompiledMethod, Module};

use crate::error::LinkError;
use crate::il::SourceModule;

pub(crate) fn link(
    methods: IndexMap<String, CompiledMethod>,
    src: &SourceModule,
    convention: CallConvention,
) -> Result<Module, LinkError> {
    let entry_name = find_entry(&methods)?;

    // Layout order: entry method at absolute 0, the rest as discovered.
    let mut methods = methods;
    let mut ordered = IndexMap::with_capacity(methods.len());
    if let Some(entry) = methods.shift_remove(&entry_name) {
        ordered.insert(entry_name, entry);
    }
    ordered.extend(methods);

    // Assign absolute addresses.
    let mut cursor = 0u32;
    for method in ordered.values_mut() {
        method.entry = cursor;
        for insn in &mut method.insns {
            insn.addr += cursor;
        }
        cursor += method.code_len();
    }

    // Patch call fixes now that every entry address is known.
    let entries: IndexMap<String, u32> = ordered
        .iter()
        .map(|(name, m)| (name.clone(), m.entry))
        .collect();
    for method in ordered.values_mut() {
        for insn in &mut method.insns {
            let Some(callee) = &insn.call_fix else {
                continue;
            };
            let Some(&target) = entries.get(callee) else {
                return Err(LinkError::UnknownCallee {
                    callee: callee.clone(),
                });
            };
            match convention {
                CallConvention::Relative => {
                    let offset = i64::from(target) - i64::from(insn.addr);
                    let offset =
                        i16::try_from(offset).map_err(|_| LinkError::CallOverflow { offset })?;
                    insn.patch_call(convention, i32::from(offset));
                }
                CallConvention::Direct => {
                    let addr = u16::try_from(target)
                        .map_err(|_| LinkError::AddressOverflow { addr: target })?;
                    insn.patch_call(convention, i32::from(addr));
                }
            }
        }
    }

    Ok(Module {
        convention,
        methods: ordered,
        constants: src.constants.clone(),
        events: src.events.clone(),
    })
}

/// Exactly one method must be flagged as the module entry point; this is
/// checked before any layout happens.
fn find_entry(methods: &IndexMap<String, CompiledMethod>) -> Result<String, LinkError> {
    let mut entry: Option<&str> = None;
    for method in methods.values() {
        if !method.is_entry {
            continue;
        }
        if let Some(first) = entry {
            return Err(LinkError::DuplicateEntry {
                first: first.to_owned(),
                second: method.name.clone(),
            });
        }
        entry = Some(&method.name);
    }
    entry.map(str::to_owned).ok_or(LinkError::MissingEntry)
}
