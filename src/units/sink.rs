//! Sinks.
//!
//! [`Dump`] writes each row as one line of JSON, to stdout (prefixed with the
//! rank) or to a file. With more than one rank in the world, every rank writes
//! its own file, named after the path with `.{rank}` appended. [`Collect`]
//! keeps rows in memory for [`Flow::run_result`](crate::flow::Flow::run_result).

use crate::flow::Row;
use crate::par::Par;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::{Context, Result};
use std::any::Any;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Where a rank writes its part of a dump.
pub fn rank_path(path: &Path, rank: usize, world: usize) -> PathBuf {
    if world > 1 {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{rank}"));
        PathBuf::from(name)
    } else {
        path.to_path_buf()
    }
}

enum Out {
    Stdout,
    File(BufWriter<File>),
}

pub struct Dump<T> {
    path: Option<PathBuf>,
    header: Option<String>,
    par: Par,
    out: Option<Out>,
    _t: PhantomData<fn(&T)>,
}

impl<T: Row> Dump<T> {
    pub fn stdout() -> Self {
        Self::build(None, None)
    }

    pub fn file(path: impl Into<PathBuf>, header: Option<String>) -> Self {
        Self::build(Some(path.into()), header)
    }

    fn build(path: Option<PathBuf>, header: Option<String>) -> Self {
        Self { path, header, par: Par::default(), out: None, _t: PhantomData }
    }

    fn open(&mut self, ctx: &UnitCtx<'_>) -> Result<&mut Out> {
        if self.out.is_none() {
            let rank = ctx.comm().rank();
            let mut out = match &self.path {
                None => Out::Stdout,
                Some(path) => {
                    let path = rank_path(path, rank, ctx.comm().size());
                    if let Some(parent) = path.parent()
                        && !parent.as_os_str().is_empty()
                    {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("creating {}", parent.display()))?;
                    }
                    let file = File::create(&path)
                        .with_context(|| format!("creating dump file {}", path.display()))?;
                    Out::File(BufWriter::new(file))
                }
            };
            if let Some(h) = &self.header {
                write_line(&mut out, rank, h)?;
            }
            self.out = Some(out);
        }
        self.out.as_mut().context("dump output not open")
    }
}

fn write_line(out: &mut Out, rank: usize, line: &str) -> Result<()> {
    match out {
        Out::Stdout => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{rank}: {line}")?;
        }
        Out::File(w) => writeln!(w, "{line}")?,
    }
    Ok(())
}

impl<T: Row> Unit for Dump<T> {
    fn kind(&self) -> UnitKind {
        UnitKind::Sink
    }

    fn label(&self) -> String {
        match &self.path {
            Some(p) => format!("dump({})", p.display()),
            None => "dump(stdout)".into(),
        }
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn set_par(&mut self, par: Par) {
        self.par = par;
        self.out = None;
    }

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<T>(batch, "dump")?;
        ctx.record_in(rows.len());
        let rank = ctx.comm().rank();
        let out = self.open(ctx)?;
        for row in rows {
            let line = serde_json::to_string(row)?;
            write_line(out, rank, &line)?;
        }
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        // in-range ranks leave a file behind even when they saw no rows
        if self.par.in_range() && self.path.is_some() {
            self.open(ctx)?;
        }
        if let Some(Out::File(mut w)) = self.out.take() {
            w.flush()?;
        }
        ctx.close();
        Ok(())
    }
}

/// Keeps every row it receives in a shared buffer.
pub struct Collect<T> {
    buf: Arc<Mutex<Vec<T>>>,
}

impl<T: Row> Collect<T> {
    pub fn new(buf: Arc<Mutex<Vec<T>>>) -> Self {
        Self { buf }
    }
}

impl<T: Row> Unit for Collect<T> {
    fn kind(&self) -> UnitKind {
        UnitKind::Sink
    }

    fn label(&self) -> String {
        "collect".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn set_par(&mut self, _par: Par) {
        self.buf.lock().expect("collect buffer poisoned").clear();
    }

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<T>(batch, "collect")?;
        ctx.record_in(rows.len());
        self.buf
            .lock()
            .expect("collect buffer poisoned")
            .extend_from_slice(rows);
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        ctx.close();
        Ok(())
    }
}
