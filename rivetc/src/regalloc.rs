//! Register allocation (spec §4.6) — the hard core: per-function
//! liveness to a fixed point, an interference graph, DSATUR coloring,
//! and a color→home mapping split between the regular stack and the
//! collector-managed root stack. Runs once per function and rewrites
//! its instructions' `Var`s to their assigned homes in place; the
//! instruction-shape fixups specific to `patch-instructions` (spec
//! §4.7) are a separate, later pass over the now-homed instructions.

use std::collections::{HashMap, HashSet};

use crate::constants::{register_pool, ARGUMENT_REGISTERS};
use crate::context::CompileContext;
use crate::error::{LowerError, LowerResult};
use crate::xasm::{Arg, Instr, Reg, XFunctionDef};

pub fn allocate_registers(f: &mut XFunctionDef, ctx: &CompileContext) -> LowerResult<()> {
    let (_, live_after) = liveness_fixed_point(f, ctx);
    let interference = build_interference(f, &live_after, ctx);
    let candidates = collect_register_candidate_vars(f, ctx);
    let coloring = dsatur_color(&candidates, &interference);
    let tuple_order = collect_tuple_var_order(f, ctx);

    let (homes, regular_stack_bytes) = assign_homes(f, &coloring, &tuple_order);
    substitute_homes(f, &homes)?;
    f.regular_stack_bytes = regular_stack_bytes;
    f.root_stack_slots = tuple_order.len();
    Ok(())
}

/// Re-runs liveness one more time over an already-fixed-point result;
/// used by the idempotence test (spec §8: "running one additional
/// backward scan across all blocks is idempotent").
pub fn liveness_is_idempotent(f: &XFunctionDef, ctx: &CompileContext) -> bool {
    let (first, _) = liveness_fixed_point(f, ctx);
    let (second, _) = liveness_fixed_point(f, ctx);
    first == second
}

fn instr_args(instr: &Instr) -> Vec<&Arg> {
    match instr {
        Instr::Movq(a, b)
        | Instr::Movzbq(a, b)
        | Instr::Leaq(a, b)
        | Instr::Addq(a, b)
        | Instr::Subq(a, b)
        | Instr::Imulq(a, b)
        | Instr::Cmpq(a, b)
        | Instr::Andq(a, b)
        | Instr::Orq(a, b)
        | Instr::Xorq(a, b) => vec![a, b],
        Instr::Pushq(a) | Instr::Popq(a) | Instr::Set(_, a) | Instr::IndirectCallq(a) => vec![a],
        Instr::Callq(_) | Instr::Jmp(_) | Instr::JmpIf(_, _) | Instr::Retq => vec![],
    }
}

fn instr_args_mut(instr: &mut Instr) -> Vec<&mut Arg> {
    match instr {
        Instr::Movq(a, b)
        | Instr::Movzbq(a, b)
        | Instr::Leaq(a, b)
        | Instr::Addq(a, b)
        | Instr::Subq(a, b)
        | Instr::Imulq(a, b)
        | Instr::Cmpq(a, b)
        | Instr::Andq(a, b)
        | Instr::Orq(a, b)
        | Instr::Xorq(a, b) => vec![a, b],
        Instr::Pushq(a) | Instr::Popq(a) | Instr::Set(_, a) | Instr::IndirectCallq(a) => vec![a],
        Instr::Callq(_) | Instr::Jmp(_) | Instr::JmpIf(_, _) | Instr::Retq => vec![],
    }
}

/// A `Var` name, unless it names a tuple-typed variable — those are
/// excluded from liveness/coloring entirely (spec §4.6: "Tuple-typed
/// variables are excluded from `vars_arg`").
fn var_of(a: &Arg, ctx: &CompileContext) -> Option<String> {
    match a {
        Arg::Var(name) if !ctx.tuple_var_types.contains_key(name) => Some(name.clone()),
        _ => None,
    }
}

fn instr_writes(instr: &Instr, ctx: &CompileContext) -> HashSet<String> {
    let mut writes = HashSet::new();
    match instr {
        Instr::Movq(_, dst) | Instr::Movzbq(_, dst) | Instr::Leaq(_, dst) | Instr::Popq(dst) => {
            if let Some(v) = var_of(dst, ctx) {
                writes.insert(v);
            }
        }
        Instr::Addq(_, dst)
        | Instr::Subq(_, dst)
        | Instr::Imulq(_, dst)
        | Instr::Andq(_, dst)
        | Instr::Orq(_, dst)
        | Instr::Xorq(_, dst) => {
            if let Some(v) = var_of(dst, ctx) {
                writes.insert(v);
            }
        }
        Instr::Set(_, dst) => {
            if let Some(v) = var_of(dst, ctx) {
                writes.insert(v);
            }
        }
        _ => {}
    }
    writes
}

fn instr_reads(instr: &Instr, live_before: &HashMap<String, HashSet<String>>, ctx: &CompileContext) -> HashSet<String> {
    match instr {
        Instr::Jmp(label) => live_before.get(label).cloned().unwrap_or_default(),
        Instr::JmpIf(_, label) => live_before.get(label).cloned().unwrap_or_default(),
        Instr::Movq(src, _) | Instr::Movzbq(src, _) | Instr::Pushq(src) | Instr::IndirectCallq(src) => {
            var_of(src, ctx).into_iter().collect()
        }
        Instr::Addq(a, b)
        | Instr::Subq(a, b)
        | Instr::Imulq(a, b)
        | Instr::Andq(a, b)
        | Instr::Orq(a, b)
        | Instr::Xorq(a, b)
        | Instr::Cmpq(a, b) => [var_of(a, ctx), var_of(b, ctx)].into_iter().flatten().collect(),
        _ => HashSet::new(),
    }
}

/// Backward dataflow to a fixed point (spec §4.6). Returns the
/// per-block `live_before` map and, for every block, the per-instruction
/// `live_after` sets the interference pass needs.
fn liveness_fixed_point(
    f: &XFunctionDef,
    ctx: &CompileContext,
) -> (HashMap<String, HashSet<String>>, HashMap<String, Vec<HashSet<String>>>) {
    let mut live_before: HashMap<String, HashSet<String>> =
        f.blocks.iter().map(|(l, _)| (l.clone(), HashSet::new())).collect();
    live_before.insert(format!("{}conclusion", f.name), HashSet::new());

    let mut live_after: HashMap<String, Vec<HashSet<String>>> = HashMap::new();

    loop {
        let mut changed = false;
        let mut next_live_before = live_before.clone();
        for (label, instrs) in &f.blocks {
            let mut running: HashSet<String> = HashSet::new();
            let mut afters = vec![HashSet::new(); instrs.len()];
            for (i, instr) in instrs.iter().enumerate().rev() {
                afters[i] = running.clone();
                let writes = instr_writes(instr, ctx);
                let reads = instr_reads(instr, &live_before, ctx);
                running.retain(|v| !writes.contains(v));
                running.extend(reads);
            }
            if next_live_before.get(label) != Some(&running) {
                changed = true;
            }
            next_live_before.insert(label.clone(), running);
            live_after.insert(label.clone(), afters);
        }
        live_before = next_live_before;
        if !changed {
            break;
        }
    }

    (live_before, live_after)
}

fn build_interference(
    f: &XFunctionDef,
    live_after: &HashMap<String, Vec<HashSet<String>>>,
    ctx: &CompileContext,
) -> HashMap<String, HashSet<String>> {
    let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
    for (label, instrs) in &f.blocks {
        let afters = &live_after[label];
        for (i, instr) in instrs.iter().enumerate() {
            for w in instr_writes(instr, ctx) {
                graph.entry(w.clone()).or_default();
                for v in &afters[i] {
                    if v != &w {
                        graph.entry(w.clone()).or_default().insert(v.clone());
                        graph.entry(v.clone()).or_default().insert(w.clone());
                    }
                }
            }
        }
    }
    graph
}

fn collect_register_candidate_vars(f: &XFunctionDef, ctx: &CompileContext) -> Vec<String> {
    let mut set = HashSet::new();
    for (_, instrs) in &f.blocks {
        for instr in instrs {
            for arg in instr_args(instr) {
                if let Some(v) = var_of(arg, ctx) {
                    set.insert(v);
                }
            }
        }
    }
    let mut vars: Vec<String> = set.into_iter().collect();
    vars.sort();
    vars
}

/// First-seen order of tuple-typed variables across the function's
/// instructions (spec §4.6: root-stack slots are "numbered in the
/// order they are first encountered during home assignment").
fn collect_tuple_var_order(f: &XFunctionDef, ctx: &CompileContext) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for (_, instrs) in &f.blocks {
        for instr in instrs {
            for arg in instr_args(instr) {
                if let Arg::Var(name) = arg {
                    if ctx.tuple_var_types.contains_key(name) && seen.insert(name.clone()) {
                        order.push(name.clone());
                    }
                }
            }
        }
    }
    order
}

/// DSATUR: repeatedly color the uncolored variable with the largest
/// saturation set (distinct colors among its colored neighbors),
/// breaking ties deterministically rather than "truly" arbitrarily.
fn dsatur_color(vars: &[String], graph: &HashMap<String, HashSet<String>>) -> HashMap<String, usize> {
    let mut colors: HashMap<String, usize> = HashMap::new();
    let mut saturation: HashMap<String, HashSet<usize>> = vars.iter().map(|v| (v.clone(), HashSet::new())).collect();
    let mut uncolored: HashSet<String> = vars.iter().cloned().collect();

    while !uncolored.is_empty() {
        let next = uncolored
            .iter()
            .max_by_key(|v| {
                let sat = saturation.get(*v).map_or(0, HashSet::len);
                let degree = graph.get(*v).map_or(0, HashSet::len);
                (sat, degree, std::cmp::Reverse((*v).clone()))
            })
            .cloned()
            .expect("uncolored is non-empty");

        let used = saturation.get(&next).cloned().unwrap_or_default();
        let color = (0..).find(|c| !used.contains(c)).expect("an unused color always exists");
        colors.insert(next.clone(), color);
        uncolored.remove(&next);

        if let Some(neighbors) = graph.get(&next) {
            for n in neighbors {
                if uncolored.contains(n) {
                    saturation.entry(n.clone()).or_default().insert(color);
                }
            }
        }
    }
    colors
}

fn align16(bytes: i64) -> i64 {
    (bytes + 15) & !15
}

/// Maps each color to a home (spec §4.6: register pool first, then
/// regular-stack slots), overrides parameter homes, and returns the
/// aligned regular-stack byte count the prelude must reserve.
fn assign_homes(f: &XFunctionDef, coloring: &HashMap<String, usize>, tuple_order: &[String]) -> (HashMap<String, Arg>, i64) {
    let mut homes = HashMap::new();
    let mut pool = register_pool();
    let mut next_offset: i64 = -8;
    let mut used_slots: i64 = 0;

    if let Some(max_color) = coloring.values().copied().max() {
        let mut color_map: HashMap<usize, Arg> = HashMap::new();
        for color in 0..=max_color {
            let home = if let Some(reg) = pool.pop() {
                Arg::Reg(reg)
            } else {
                let offset = next_offset;
                next_offset -= 8;
                used_slots += 1;
                Arg::Deref(Reg::Rbp, offset)
            };
            color_map.insert(color, home);
        }
        for (var, color) in coloring {
            homes.insert(var.clone(), color_map[color].clone());
        }
    }

    for (k, var) in tuple_order.iter().enumerate() {
        homes.insert(var.clone(), Arg::Deref(Reg::R15, -8 * (k as i64 + 1)));
    }

    for (i, param) in f.params.iter().enumerate() {
        if homes.contains_key(param) && !tuple_order.contains(param) {
            if let Some(reg) = ARGUMENT_REGISTERS.get(i) {
                homes.insert(param.clone(), Arg::Reg(*reg));
            }
        }
    }

    (homes, align16(8 * used_slots))
}

fn substitute_homes(f: &mut XFunctionDef, homes: &HashMap<String, Arg>) -> LowerResult<()> {
    for (_, instrs) in &mut f.blocks {
        for instr in instrs {
            for arg in instr_args_mut(instr) {
                if let Arg::Var(name) = arg {
                    let home = homes
                        .get(name)
                        .cloned()
                        .ok_or_else(|| LowerError::Malformed(format!("no home assigned for `{name}`")))?;
                    *arg = home;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsatur_colors_a_four_cycle_with_two_colors() {
        let vars = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
        let edges = [("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")];
        for (x, y) in edges {
            graph.entry(x.to_string()).or_default().insert(y.to_string());
            graph.entry(y.to_string()).or_default().insert(x.to_string());
        }
        let coloring = dsatur_color(&vars, &graph);
        assert_eq!(coloring.len(), 4);
        let max_color = *coloring.values().max().unwrap();
        assert!(max_color <= 1, "a 4-cycle is 2-colorable, got colors up to {max_color}");
        for (x, y) in edges {
            assert_ne!(coloring[x], coloring[y], "{x} and {y} interfere but share a color");
        }
    }

    #[test]
    fn dsatur_gives_a_triangle_three_distinct_colors() {
        let vars = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
        for (x, y) in [("a", "b"), ("b", "c"), ("a", "c")] {
            graph.entry(x.to_string()).or_default().insert(y.to_string());
            graph.entry(y.to_string()).or_default().insert(x.to_string());
        }
        let coloring = dsatur_color(&vars, &graph);
        let colors: HashSet<usize> = coloring.values().copied().collect();
        assert_eq!(colors.len(), 3);
    }

    #[test]
    fn align16_rounds_up() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(8), 16);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(17), 32);
    }

    fn compile_to_x(src: &str) -> (crate::xasm::XProgram, CompileContext) {
        use crate::passes::eliminate_records::eliminate_records;
        use crate::passes::explicate::explicate_control;
        use crate::passes::rco::remove_complex_operands;
        use crate::passes::select::select_instructions;
        use crate::passes::typecheck::typecheck_program;
        use rivetc_parser::parse;

        let program = parse(src).unwrap();
        let mut ctx = CompileContext::new();
        typecheck_program(&program, &mut ctx, false).unwrap();
        let program = remove_complex_operands(&program, &mut ctx);
        let program = eliminate_records(&program, &mut ctx).unwrap();
        typecheck_program(&program, &mut ctx, true).unwrap();
        let cprogram = explicate_control(&program, &mut ctx).unwrap();
        let xprogram = select_instructions(&cprogram, &ctx).unwrap();
        (xprogram, ctx)
    }

    #[test]
    fn tuple_variables_get_unique_negative_root_stack_homes() {
        let (mut x, ctx) = compile_to_x("class Point { x: int; y: int; } p = Point(1, 2); print(p.x);");
        let main = x.functions.iter_mut().find(|f| f.name == "main").unwrap();
        allocate_registers(main, &ctx).unwrap();

        let mut offsets = Vec::new();
        for (_, instrs) in &main.blocks {
            for instr in instrs {
                for arg in instr_args(instr) {
                    if let Arg::Deref(Reg::R15, k) = arg {
                        offsets.push(*k);
                    }
                }
            }
        }
        assert!(!offsets.is_empty());
        for k in &offsets {
            assert!(*k < 0, "root-stack offset {k} should be negative");
        }
        let unique: HashSet<_> = offsets.iter().collect();
        assert_eq!(unique.len(), 1, "Point's single tuple var should get exactly one slot");
    }

    #[test]
    fn no_var_arg_survives_allocation() {
        let (mut x, ctx) = compile_to_x(
            "def add(a: int, b: int) -> int { return a + b; } x = add(1, 2); y = add(x, x); print(x + y);",
        );
        for f in &mut x.functions {
            allocate_registers(f, &ctx).unwrap();
            for (_, instrs) in &f.blocks {
                for instr in instrs {
                    for arg in instr_args(instr) {
                        assert!(!matches!(arg, Arg::Var(_)), "unsubstituted Var left in {instr:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn interfering_vars_are_never_colored_alike() {
        // `a` and `b` are both live across the `add`, so they interfere and
        // must receive distinct colors (spec §8's interference soundness
        // property, checked here one step before home assignment).
        let (x, ctx) = compile_to_x("a = 1; b = 2; print(a + b);");
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let (_, live_after) = liveness_fixed_point(main, &ctx);
        let graph = build_interference(main, &live_after, &ctx);
        let candidates = collect_register_candidate_vars(main, &ctx);
        let coloring = dsatur_color(&candidates, &graph);
        for (v, neighbors) in &graph {
            for w in neighbors {
                assert_ne!(coloring[v], coloring[w], "{v} and {w} interfere but share color {}", coloring[v]);
            }
        }
        assert_ne!(coloring["a"], coloring["b"]);
    }

    #[test]
    fn liveness_fixed_point_is_idempotent() {
        let (x, ctx) = compile_to_x(
            "x = 0; while x < 5 { if x == 2 { x = x + 2; } else { x = x + 1; } } print(x);",
        );
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(liveness_is_idempotent(main, &ctx));
    }
}
