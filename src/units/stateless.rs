//! Stateless links.
//!
//! Links run on the ranks of whatever feeds them and transform each batch
//! independently. They close as soon as all their inputs have closed.

use crate::flow::Row;
use crate::par::Par;
use crate::type_token::{TypeTag, downcast_batch};
use crate::unit::{Unit, UnitCtx, UnitKind};
use anyhow::Result;
use std::any::Any;
use std::marker::PhantomData;

pub struct Map<I, O, F> {
    f: F,
    _t: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> Map<I, O, F> {
    pub fn new(f: F) -> Self {
        Self { f, _t: PhantomData }
    }
}

impl<I, O, F> Unit for Map<I, O, F>
where
    I: Row,
    O: Row,
    F: Fn(&I) -> O + Send + Sync + 'static,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        "map".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<O>()
    }

    fn set_par(&mut self, _par: Par) {}

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<I>(batch, "map")?;
        ctx.record_in(rows.len());
        ctx.emit(rows.iter().map(&self.f).collect::<Vec<O>>());
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        ctx.close();
        Ok(())
    }
}

pub struct Filter<T, P> {
    pred: P,
    _t: PhantomData<fn(&T)>,
}

impl<T, P> Filter<T, P> {
    pub fn new(pred: P) -> Self {
        Self { pred, _t: PhantomData }
    }
}

impl<T, P> Unit for Filter<T, P>
where
    T: Row,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        "filter".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn set_par(&mut self, _par: Par) {}

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<T>(batch, "filter")?;
        ctx.record_in(rows.len());
        ctx.emit(rows.iter().filter(|r| (self.pred)(r)).cloned().collect::<Vec<T>>());
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        ctx.close();
        Ok(())
    }
}

pub struct FlatMap<I, O, F> {
    f: F,
    _t: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> FlatMap<I, O, F> {
    pub fn new(f: F) -> Self {
        Self { f, _t: PhantomData }
    }
}

impl<I, O, F> Unit for FlatMap<I, O, F>
where
    I: Row,
    O: Row,
    F: Fn(&I) -> Vec<O> + Send + Sync + 'static,
{
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        "flat_map".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<O>()
    }

    fn set_par(&mut self, _par: Par) {}

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<I>(batch, "flat_map")?;
        ctx.record_in(rows.len());
        let mut out: Vec<O> = Vec::new();
        for r in rows {
            out.extend((self.f)(r));
        }
        ctx.emit(out);
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        ctx.close();
        Ok(())
    }
}

/// Forwards rows unchanged. Used to merge several flows into one.
pub struct Pass<T>(PhantomData<fn(&T)>);

impl<T> Default for Pass<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Row> Unit for Pass<T> {
    fn kind(&self) -> UnitKind {
        UnitKind::Link
    }

    fn label(&self) -> String {
        "union".into()
    }

    fn row_tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn set_par(&mut self, _par: Par) {}

    fn data(&mut self, _port: usize, batch: &dyn Any, ctx: &mut UnitCtx<'_>) -> Result<()> {
        let rows = downcast_batch::<T>(batch, "union")?;
        ctx.record_in(rows.len());
        ctx.emit(rows.to_vec());
        Ok(())
    }

    fn end(&mut self, _port: usize, ctx: &mut UnitCtx<'_>) -> Result<()> {
        ctx.close();
        Ok(())
    }
}
