//! Register arithmetic, strings, aliases, randomness and clock queries.

use chrono::{Datelike, Local, Timelike};
use log::trace;

use crate::args::{Args, VarRef};
use crate::dispatch::StepFlags;
use crate::engine::Engine;
use crate::error::{EngineResult, ScriptError, ScriptResult};

fn done() -> EngineResult<StepFlags> {
    Ok(StepFlags::NONE)
}

/// `mov %n, expr` / `mov $n, strexpr`
pub fn mov(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    match args.var(&scope)? {
        VarRef::Num(index) => {
            args.comma()?;
            let value = args.int(&scope)?;
            engine.state.vars.set_num(index, value)?;
        }
        VarRef::Str(index) => {
            args.comma()?;
            let value = args.string(&scope)?;
            engine.state.vars.set_str(index, value)?;
        }
    }
    done()
}

/// `add %n, expr` adds; `add $n, strexpr` appends.
pub fn add(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    match args.var(&scope)? {
        VarRef::Num(index) => {
            args.comma()?;
            let rhs = args.int(&scope)?;
            let value = scope.vars.num(index)?.wrapping_add(rhs);
            engine.state.vars.set_num(index, value)?;
        }
        VarRef::Str(index) => {
            args.comma()?;
            let mut value = scope.vars.str(index)?.to_string();
            value.push_str(&args.string(&scope)?);
            engine.state.vars.set_str(index, value)?;
        }
    }
    done()
}

fn arithmetic(
    engine: &mut Engine,
    args: &mut Args<'_>,
    op: fn(i32, i32) -> ScriptResult<i32>,
) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let rhs = args.int(&scope)?;
    let value = op(scope.vars.num(index)?, rhs)?;
    engine.state.vars.set_num(index, value)?;
    done()
}

/// `sub %n, expr`
pub fn sub(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    arithmetic(engine, args, |a, b| Ok(a.wrapping_sub(b)))
}

/// `mul %n, expr`
pub fn mul(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    arithmetic(engine, args, |a, b| Ok(a.wrapping_mul(b)))
}

/// `div %n, expr`
pub fn div(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    arithmetic(engine, args, |a, b| {
        if b == 0 {
            Err(ScriptError::DivisionByZero)
        } else {
            Ok(a.wrapping_div(b))
        }
    })
}

/// `mod %n, expr`
pub fn modulo(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    arithmetic(engine, args, |a, b| {
        if b == 0 {
            Err(ScriptError::DivisionByZero)
        } else {
            Ok(a.wrapping_rem(b))
        }
    })
}

fn step_by(engine: &mut Engine, args: &mut Args<'_>, delta: i32) -> EngineResult<StepFlags> {
    let index = args.num_var(&engine.scope())?;
    let value = engine.state.vars.num(index)?.wrapping_add(delta);
    engine.state.vars.set_num(index, value)?;
    done()
}

/// `inc %n`
pub fn inc(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    step_by(engine, args, 1)
}

/// `dec %n`
pub fn dec(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    step_by(engine, args, -1)
}

/// `itoa $s, expr`
pub fn itoa(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.str_var(&scope)?;
    args.comma()?;
    let value = args.int(&scope)?;
    engine.state.vars.set_str(index, value.to_string())?;
    done()
}

/// `atoi %n, strexpr`: leading decimal digits, 0 when there are none.
pub fn atoi(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let text = args.string(&scope)?;
    engine.state.vars.set_num(index, leading_int(&text))?;
    done()
}

fn leading_int(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, b| {
            acc.wrapping_mul(10).wrapping_add(i32::from(b - b'0'))
        });
    if negative { value.wrapping_neg() } else { value }
}

/// `len %n, strexpr`: length in characters.
pub fn len(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let text = args.string(&scope)?;
    let count = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
    engine.state.vars.set_num(index, count)?;
    done()
}

/// `cmp %n, a, b`: -1, 0 or 1.
pub fn cmp(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let lhs = args.string(&scope)?;
    args.comma()?;
    let rhs = args.string(&scope)?;
    let result = match lhs.cmp(&rhs) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    };
    engine.state.vars.set_num(index, result)?;
    done()
}

/// `rnd %n, max`: a value in `0..max`.
pub fn rnd(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let max = args.int(&scope)?;
    if max <= 0 {
        return Err(args.malformed(format!("upper bound {max} must be positive")).into());
    }
    let value = engine.state.rng.range(0, max - 1);
    trace!("rnd %{index} = {value}");
    engine.state.vars.set_num(index, value)?;
    done()
}

/// `rnd2 %n, low, high`: a value in `low..=high`.
pub fn rnd2(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let low = args.int(&scope)?;
    args.comma()?;
    let high = args.int(&scope)?;
    let value = engine.state.rng.range(low, high);
    engine.state.vars.set_num(index, value)?;
    done()
}

/// `numalias name, value`
pub fn numalias(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let name = args.word()?;
    args.comma()?;
    let value = args.int(&engine.scope())?;
    engine.settings.num_aliases.insert(name, value);
    done()
}

/// `stralias name, "text"`
pub fn stralias(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let name = args.word()?;
    args.comma()?;
    let value = args.string(&engine.scope())?;
    engine.settings.str_aliases.insert(name, value);
    done()
}

fn set_three(engine: &mut Engine, args: &mut Args<'_>, values: [i32; 3]) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let a = args.num_var(&scope)?;
    args.comma()?;
    let b = args.num_var(&scope)?;
    args.comma()?;
    let c = args.num_var(&scope)?;
    for (index, value) in [a, b, c].into_iter().zip(values) {
        engine.state.vars.set_num(index, value)?;
    }
    done()
}

fn clock_value(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// `date %year, %month, %day`
pub fn date(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let now = Local::now();
    set_three(
        engine,
        args,
        [now.year(), clock_value(now.month()), clock_value(now.day())],
    )
}

/// `time %hour, %minute, %second`
pub fn time(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let now = Local::now();
    set_three(
        engine,
        args,
        [
            clock_value(now.hour()),
            clock_value(now.minute()),
            clock_value(now.second()),
        ],
    )
}

/// `fileexist %n, "name"`: 1 when the archive has the file.
pub fn fileexist(engine: &mut Engine, args: &mut Args<'_>) -> EngineResult<StepFlags> {
    let scope = engine.scope();
    let index = args.num_var(&scope)?;
    args.comma()?;
    let name = args.string(&scope)?;
    let exists = engine.host.file_exists(&name);
    engine.state.vars.set_num(index, i32::from(exists))?;
    done()
}
