//! Mock glue component for integration tests
//!
//! Implements every glue entry point in Rust over an in-memory object world so
//! the bridge can be driven without a .NET installation.
//!
//! Resolved members are slot trampolines: one table of `extern "system"`
//! functions per wire shape (`"p:pi"` = returns a pointer, takes a pointer and
//! an `i32`). Each slot is bound to a member implementation and, for instance
//! methods, a target object. The world lock is never held while calling back
//! into the bridge.

#![allow(dead_code)]

use core::ffi::c_void;
use std::collections::HashMap;

use dotnet_bridge::adapter::EntryPoint;
use dotnet_bridge::marshal::{read_wide, ParameterWire, UnmanagedType};
use dotnet_bridge::{adapter, EntryPointResolver, GlueNames};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};

pub type ObjId = u64;
type SlotKey = (&'static str, usize);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Wire {
    I(i32),
    P(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    I32(i32),
    Str(String),
    Obj(ObjId),
    Null,
}

/// Exception thrown by a mock member
#[derive(Clone, Debug)]
pub struct Thrown {
    pub type_name: String,
    pub message: String,
}

impl Thrown {
    fn new(type_name: &str, message: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            message: message.to_string(),
        }
    }
}

type MemberFn = fn(Option<ObjId>, &[Wire]) -> Result<Value, Thrown>;

#[derive(Clone, Debug)]
pub struct ProxyMethod {
    pub shape: String,
    callback: usize,
    cleanup: usize,
    context: usize,
}

#[derive(Debug)]
pub enum Kind {
    StringBuilder { text: String, max: usize },
    Int32Array(Vec<i32>),
    StringArray(Vec<String>),
    Foo { bar: String, transformation: Option<ObjId> },
    PropertyChangedArgs { property: String },
    Exception { type_name: String, message: String, inner: Option<ObjId> },
    Type { name: String },
    SafeReturn { value: Value, exception: Option<ObjId> },
    Proxy { interface: String, methods: HashMap<String, ProxyMethod> },
}

impl Kind {
    fn full_name(&self) -> String {
        match self {
            Kind::StringBuilder { .. } => "System.Text.StringBuilder".into(),
            Kind::Int32Array(_) => "System.Int32[]".into(),
            Kind::StringArray(_) => "System.String[]".into(),
            Kind::Foo { .. } => "FooLib.Foo".into(),
            Kind::PropertyChangedArgs { .. } => "System.ComponentModel.PropertyChangedEventArgs".into(),
            Kind::Exception { type_name, .. } => full_name(type_name).into(),
            Kind::Type { .. } => "System.RuntimeType".into(),
            Kind::SafeReturn { .. } => "Qt.DotNet.SafeReturn".into(),
            Kind::Proxy { .. } => "Qt.DotNet.InterfaceProxy".into(),
        }
    }

    fn children(&self) -> Vec<ObjId> {
        match self {
            Kind::Foo { transformation: Some(t), .. } => vec![*t],
            Kind::Exception { inner: Some(i), .. } => vec![*i],
            Kind::SafeReturn { value, exception } => {
                let mut children: Vec<ObjId> = exception.iter().copied().collect();
                if let Value::Obj(v) = value {
                    children.push(*v);
                }
                children
            }
            _ => Vec::new(),
        }
    }
}

fn full_name(type_name: &str) -> &str {
    type_name.split(',').next().unwrap_or(type_name).trim()
}

struct Object {
    kind: Kind,
    pins: usize,
}

#[derive(Clone, Copy)]
enum Binding {
    Member {
        member: MemberFn,
        target: Option<ObjId>,
        is_static: bool,
    },
    Safe {
        inner: SlotKey,
        target: Option<ObjId>,
        is_static: bool,
    },
}

impl Binding {
    fn same(&self, other: &Binding) -> bool {
        match (self, other) {
            (
                Binding::Member { member: a, target: ta, .. },
                Binding::Member { member: b, target: tb, .. },
            ) => *a as usize == *b as usize && ta == tb,
            (Binding::Safe { inner: a, .. }, Binding::Safe { inner: b, .. }) => a == b,
            _ => false,
        }
    }

    fn target(&self) -> Option<ObjId> {
        match self {
            Binding::Member { target, .. } | Binding::Safe { target, .. } => *target,
        }
    }

    fn is_static(&self) -> bool {
        match self {
            Binding::Member { is_static, .. } | Binding::Safe { is_static, .. } => *is_static,
        }
    }
}

struct EventEntry {
    source: ObjId,
    name: String,
    context: usize,
    callback: usize,
}

/// Everything the mock runtime knows
pub struct World {
    objects: HashMap<ObjId, Object>,
    next_object: ObjId,
    handles: HashMap<usize, (ObjId, bool)>,
    next_handle: usize,
    slots: HashMap<SlotKey, (Binding, Option<String>)>,
    events: Vec<EventEntry>,
    strings: Vec<Vec<u16>>,
    next_key: u64,
    /// Assemblies loaded through the glue
    pub loaded: Vec<String>,
    /// Cleanup calls made after proxy callbacks
    pub cleanups: usize,
    /// Exceptions thrown by raw (unsafe) calls
    pub unhandled: Vec<Thrown>,
}

static WORLD: Lazy<Mutex<World>> = Lazy::new(|| {
    Mutex::new(World {
        objects: HashMap::new(),
        next_object: 1,
        handles: HashMap::new(),
        next_handle: 0x1000,
        slots: HashMap::new(),
        events: Vec::new(),
        strings: Vec::new(),
        next_key: 0,
        loaded: Vec::new(),
        cleanups: 0,
        unhandled: Vec::new(),
    })
});

pub fn world() -> MutexGuard<'static, World> {
    WORLD.lock()
}

impl World {
    fn create(&mut self, kind: Kind) -> ObjId {
        let id = self.next_object;
        self.next_object += 1;
        self.objects.insert(id, Object { kind, pins: 0 });
        id
    }

    fn new_handle(&mut self, object: ObjId, weak: bool) -> usize {
        let handle = self.next_handle;
        self.next_handle += 0x10;
        self.handles.insert(handle, (object, weak));
        handle
    }

    /// Live object behind `handle`; weak handles of collected objects give `None`
    fn object(&self, handle: usize) -> Option<ObjId> {
        let (id, _) = self.handles.get(&handle)?;
        self.objects.contains_key(id).then_some(*id)
    }

    pub fn kind(&self, id: ObjId) -> Option<&Kind> {
        self.objects.get(&id).map(|o| &o.kind)
    }

    fn kind_mut(&mut self, id: ObjId) -> Option<&mut Kind> {
        self.objects.get_mut(&id).map(|o| &mut o.kind)
    }

    fn pin(&mut self, id: ObjId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.pins += 1;
        }
    }

    fn unpin(&mut self, id: ObjId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.pins = object.pins.saturating_sub(1);
        }
    }

    fn release(&mut self, handle: usize) {
        if let Some((id, _)) = self.handles.remove(&handle) {
            self.collect(id);
        }
    }

    /// Drop `id` once nothing keeps it alive
    fn collect(&mut self, id: ObjId) {
        let strong = self.handles.values().any(|(o, weak)| *o == id && !weak);
        let pinned = self.objects.get(&id).map_or(false, |o| o.pins > 0);
        if strong || pinned {
            return;
        }
        let Some(object) = self.objects.remove(&id) else {
            return;
        };
        self.slots.retain(|_, (binding, _)| binding.target() != Some(id));
        self.events.retain(|e| e.source != id);
        for child in object.kind.children() {
            self.unpin(child);
            self.collect(child);
        }
    }

    fn leak_string(&mut self, s: &str) -> usize {
        let wide = wide(s);
        let ptr = wide.as_ptr() as usize;
        self.strings.push(wide);
        ptr
    }

    fn bind(&mut self, shape: &str, binding: Binding, type_name: Option<String>) -> *mut c_void {
        let Some((family, table)) = TABLES.get_key_value(shape) else {
            return std::ptr::null_mut();
        };
        // the same member on the same target shares its delegate
        let existing = self
            .slots
            .iter()
            .find(|((f, _), (b, t))| f == family && b.same(&binding) && *t == type_name)
            .map(|((_, n), _)| *n);
        if let Some(n) = existing {
            return table[n] as *mut c_void;
        }
        let Some(n) = (0..table.len()).find(|n| !self.slots.contains_key(&(*family, *n))) else {
            return std::ptr::null_mut();
        };
        self.slots.insert((*family, n), (binding, type_name));
        table[n] as *mut c_void
    }

    /// Objects still alive in the mock runtime
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Handles issued and not yet released, weak ones included
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// `(method, shape)` of each method routed on the proxy behind `handle`
    pub fn interface_methods(&self, handle: *mut c_void) -> Vec<(String, String)> {
        let mut methods: Vec<_> = match self.object(handle as usize).and_then(|id| self.kind(id)) {
            Some(Kind::Proxy { methods, .. }) => methods
                .iter()
                .map(|(name, m)| (name.clone(), m.shape.clone()))
                .collect(),
            _ => Vec::new(),
        };
        methods.sort();
        methods
    }

    /// Handlers registered for `event` on any object
    pub fn handlers(&self, event: &str) -> usize {
        self.events.iter().filter(|e| e.name == event).count()
    }

    /// Static and constructor bindings held for `type_name`
    pub fn static_bindings(&self, type_name: &str) -> usize {
        self.slots
            .values()
            .filter(|(b, t)| b.is_static() && t.as_deref() == Some(type_name))
            .count()
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

// ============================================================================
// Slot trampolines
// ============================================================================

trait IntoWire {
    fn into_wire(self) -> Wire;
}

impl IntoWire for i32 {
    fn into_wire(self) -> Wire {
        Wire::I(self)
    }
}

impl IntoWire for *mut c_void {
    fn into_wire(self) -> Wire {
        Wire::P(self as usize)
    }
}

trait FromWire {
    fn from_wire(wire: Wire) -> Self;
}

impl FromWire for i32 {
    fn from_wire(wire: Wire) -> Self {
        match wire {
            Wire::I(v) => v,
            Wire::P(_) => 0,
        }
    }
}

impl FromWire for *mut c_void {
    fn from_wire(wire: Wire) -> Self {
        match wire {
            Wire::P(p) => p as *mut c_void,
            Wire::I(_) => std::ptr::null_mut(),
        }
    }
}

impl FromWire for () {
    fn from_wire(_: Wire) {}
}

macro_rules! slot_table {
    ($slot:ident as $fn_ptr:ty) => {
        vec![$slot::<0> as $fn_ptr as usize, $slot::<1> as $fn_ptr as usize, $slot::<2> as $fn_ptr as usize, $slot::<3> as $fn_ptr as usize, $slot::<4> as $fn_ptr as usize, $slot::<5> as $fn_ptr as usize, $slot::<6> as $fn_ptr as usize, $slot::<7> as $fn_ptr as usize, $slot::<8> as $fn_ptr as usize, $slot::<9> as $fn_ptr as usize, $slot::<10> as $fn_ptr as usize, $slot::<11> as $fn_ptr as usize, $slot::<12> as $fn_ptr as usize, $slot::<13> as $fn_ptr as usize, $slot::<14> as $fn_ptr as usize, $slot::<15> as $fn_ptr as usize, $slot::<16> as $fn_ptr as usize, $slot::<17> as $fn_ptr as usize, $slot::<18> as $fn_ptr as usize, $slot::<19> as $fn_ptr as usize, $slot::<20> as $fn_ptr as usize, $slot::<21> as $fn_ptr as usize, $slot::<22> as $fn_ptr as usize, $slot::<23> as $fn_ptr as usize, $slot::<24> as $fn_ptr as usize, $slot::<25> as $fn_ptr as usize, $slot::<26> as $fn_ptr as usize, $slot::<27> as $fn_ptr as usize, $slot::<28> as $fn_ptr as usize, $slot::<29> as $fn_ptr as usize, $slot::<30> as $fn_ptr as usize, $slot::<31> as $fn_ptr as usize, $slot::<32> as $fn_ptr as usize, $slot::<33> as $fn_ptr as usize, $slot::<34> as $fn_ptr as usize, $slot::<35> as $fn_ptr as usize, $slot::<36> as $fn_ptr as usize, $slot::<37> as $fn_ptr as usize, $slot::<38> as $fn_ptr as usize, $slot::<39> as $fn_ptr as usize, $slot::<40> as $fn_ptr as usize, $slot::<41> as $fn_ptr as usize, $slot::<42> as $fn_ptr as usize, $slot::<43> as $fn_ptr as usize, $slot::<44> as $fn_ptr as usize, $slot::<45> as $fn_ptr as usize, $slot::<46> as $fn_ptr as usize, $slot::<47> as $fn_ptr as usize, $slot::<48> as $fn_ptr as usize, $slot::<49> as $fn_ptr as usize, $slot::<50> as $fn_ptr as usize, $slot::<51> as $fn_ptr as usize, $slot::<52> as $fn_ptr as usize, $slot::<53> as $fn_ptr as usize, $slot::<54> as $fn_ptr as usize, $slot::<55> as $fn_ptr as usize, $slot::<56> as $fn_ptr as usize, $slot::<57> as $fn_ptr as usize, $slot::<58> as $fn_ptr as usize, $slot::<59> as $fn_ptr as usize, $slot::<60> as $fn_ptr as usize, $slot::<61> as $fn_ptr as usize, $slot::<62> as $fn_ptr as usize, $slot::<63> as $fn_ptr as usize]
    };
}

macro_rules! families {
    ($($name:ident => $key:literal, ($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            mod $name {
                use super::*;

                type Slot = extern "system" fn($($ty),*) -> $ret;

                pub extern "system" fn slot<const N: usize>($($arg: $ty),*) -> $ret {
                    <$ret as FromWire>::from_wire(dispatch($key, N, &[$(IntoWire::into_wire($arg)),*]))
                }

                pub fn table() -> Vec<usize> {
                    slot_table!(slot as Slot)
                }
            }
        )*

        fn family_tables() -> HashMap<&'static str, Vec<usize>> {
            HashMap::from([$(($key, $name::table())),*])
        }
    };
}

families! {
    v0 => "v:", () -> ();
    p0 => "p:", () -> *mut c_void;
    i0 => "i:", () -> i32;
    pp => "p:p", (a: *mut c_void) -> *mut c_void;
    ip => "i:p", (a: *mut c_void) -> i32;
    ii => "i:i", (a: i32) -> i32;
    pi => "p:i", (a: i32) -> *mut c_void;
    vp => "v:p", (a: *mut c_void) -> ();
    iii => "i:ii", (a: i32, b: i32) -> i32;
    vii => "v:ii", (a: i32, b: i32) -> ();
    vip => "v:ip", (a: i32, b: *mut c_void) -> ();
    pii => "p:ii", (a: i32, b: i32) -> *mut c_void;
    ppp => "p:pp", (a: *mut c_void, b: *mut c_void) -> *mut c_void;
    ppi => "p:pi", (a: *mut c_void, b: i32) -> *mut c_void;
    pppp => "p:ppp", (a: *mut c_void, b: *mut c_void, c: *mut c_void) -> *mut c_void;
    ppii => "p:pii", (a: *mut c_void, b: i32, c: i32) -> *mut c_void;
    ppip => "p:pip", (a: *mut c_void, b: i32, c: *mut c_void) -> *mut c_void;
}

static TABLES: Lazy<HashMap<&'static str, Vec<usize>>> = Lazy::new(family_tables);

static REVERSE: Lazy<HashMap<usize, SlotKey>> = Lazy::new(|| {
    TABLES
        .iter()
        .flat_map(|(family, table)| table.iter().enumerate().map(move |(n, f)| (*f, (*family, n))))
        .collect()
});

fn dispatch(family: &'static str, n: usize, args: &[Wire]) -> Wire {
    let ret = family.as_bytes()[0];
    let Some((binding, type_name)) = world().slots.get(&(family, n)).cloned() else {
        return to_wire(ret, Value::Null);
    };
    if let Some(type_name) = type_name {
        *CONSTRUCTING.lock() = type_name;
    }
    let binding = Some(binding);
    let value = match binding {
        None => Value::Null,
        Some(Binding::Member { member, target, .. }) => member(target, args).unwrap_or_else(|thrown| {
            world().unhandled.push(thrown);
            Value::Null
        }),
        Some(Binding::Safe { inner, .. }) => {
            let inner = world().slots.get(&inner).map(|(b, _)| *b);
            let result = match inner {
                Some(Binding::Member { member, target, .. }) => member(target, args.get(1..).unwrap_or(&[])),
                _ => Ok(Value::Null),
            };
            let mut w = world();
            let kind = match result {
                Ok(value) => {
                    if let Value::Obj(v) = value {
                        w.pin(v);
                    }
                    Kind::SafeReturn { value, exception: None }
                }
                Err(thrown) => {
                    let exception = w.create(Kind::Exception {
                        type_name: thrown.type_name,
                        message: thrown.message,
                        inner: None,
                    });
                    w.pin(exception);
                    Kind::SafeReturn {
                        value: Value::Null,
                        exception: Some(exception),
                    }
                }
            };
            Value::Obj(w.create(kind))
        }
    };
    to_wire(ret, value)
}

fn to_wire(ret: u8, value: Value) -> Wire {
    let mut w = world();
    match (ret, value) {
        (b'i', Value::I32(v)) => Wire::I(v),
        (b'i', _) | (b'v', _) => Wire::I(0),
        (_, Value::Str(s)) => Wire::P(w.leak_string(&s)),
        (_, Value::Obj(id)) => Wire::P(w.new_handle(id, false)),
        _ => Wire::P(0),
    }
}

// ============================================================================
// Member arguments
// ============================================================================

fn arg_str(args: &[Wire], i: usize) -> String {
    match args.get(i) {
        Some(Wire::P(p)) => unsafe { read_wide(*p as *const u16) },
        _ => String::new(),
    }
}

fn arg_i32(args: &[Wire], i: usize) -> i32 {
    match args.get(i) {
        Some(Wire::I(v)) => *v,
        _ => 0,
    }
}

fn arg_obj(args: &[Wire], i: usize) -> Option<ObjId> {
    match args.get(i) {
        Some(Wire::P(p)) => world().object(*p),
        _ => None,
    }
}

fn null_target() -> Thrown {
    Thrown::new("System.NullReferenceException", "Object reference not set to an instance of an object.")
}

fn index_out_of_range() -> Thrown {
    Thrown::new("System.IndexOutOfRangeException", "Index was outside the bounds of the array.")
}

// ============================================================================
// Members
// ============================================================================

fn static_member(type_name: &str, method: &str, shape: &str) -> Option<MemberFn> {
    let member: MemberFn = match (type_name, method, shape) {
        ("System.Environment", "GetEnvironmentVariable", "p:p") => |_, a| {
            Ok(std::env::var(arg_str(a, 0)).map(Value::Str).unwrap_or(Value::Null))
        },
        ("System.Type", "GetType", "p:p") => |_, a| {
            let name = arg_str(a, 0);
            let known = ["System.String", "System.Int32", "System.Text.StringBuilder", "FooLib.Foo"];
            if known.contains(&full_name(&name)) {
                Ok(Value::Obj(world().create(Kind::Type { name })))
            } else {
                Ok(Value::Null)
            }
        },
        ("System.String", "Join", "p:pp") => |_, a| {
            let separator = arg_str(a, 0);
            let id = arg_obj(a, 1).ok_or_else(|| Thrown::new("System.ArgumentNullException", "Value cannot be null."))?;
            match world().kind(id) {
                Some(Kind::StringArray(items)) => Ok(Value::Str(items.join(&separator))),
                _ => Err(Thrown::new("System.ArgumentException", "Not a string array.")),
            }
        },
        ("System.Math", "Max", "i:ii") => |_, a| Ok(Value::I32(arg_i32(a, 0).max(arg_i32(a, 1)))),
        ("System.Convert", "ToInt32", "i:p") => |_, a| {
            arg_str(a, 0)
                .trim()
                .parse::<i32>()
                .map(Value::I32)
                .map_err(|_| Thrown::new("System.FormatException", "The input string was not in a correct format."))
        },
        _ => return None,
    };
    Some(member)
}

fn constructor(type_name: &str, shape: &str) -> Option<MemberFn> {
    let member: MemberFn = match (full_name(type_name), shape) {
        ("System.Text.StringBuilder", "p:ii") => |_, a| {
            let (capacity, max) = (arg_i32(a, 0), arg_i32(a, 1));
            if capacity < 0 || capacity > max {
                return Err(Thrown::new(
                    "System.ArgumentOutOfRangeException",
                    "Capacity exceeds maximum capacity.",
                ));
            }
            Ok(Value::Obj(world().create(Kind::StringBuilder {
                text: String::new(),
                max: max as usize,
            })))
        },
        ("FooLib.Foo", "p:") => |_, _| {
            Ok(Value::Obj(world().create(Kind::Foo {
                bar: String::new(),
                transformation: None,
            })))
        },
        ("System.Int32[]", "p:i") => |_, a| {
            let length = usize::try_from(arg_i32(a, 0))
                .map_err(|_| Thrown::new("System.OverflowException", "Arithmetic operation resulted in an overflow."))?;
            Ok(Value::Obj(world().create(Kind::Int32Array(vec![0; length]))))
        },
        ("System.String[]", "p:i") => |_, a| {
            let length = usize::try_from(arg_i32(a, 0))
                .map_err(|_| Thrown::new("System.OverflowException", "Arithmetic operation resulted in an overflow."))?;
            Ok(Value::Obj(world().create(Kind::StringArray(vec![String::new(); length]))))
        },
        (name, "p:p") if name.ends_with("Exception") => {
            // Exception(string message); the slot records its type before running
            |_, a| {
                Ok(Value::Obj(world().create(Kind::Exception {
                    type_name: CONSTRUCTING.lock().clone(),
                    message: arg_str(a, 0),
                    inner: None,
                })))
            }
        }
        _ => return None,
    };
    Some(member)
}

/// Declaring type of the static member currently running
static CONSTRUCTING: Lazy<Mutex<String>> = Lazy::new(|| Mutex::new(String::new()));

fn instance_member(kind: &Kind, method: &str, shape: &str) -> Option<MemberFn> {
    let member: MemberFn = match (kind, method, shape) {
        (_, "GetType", "p:") => |t, _| {
            let mut w = world();
            let name = w.kind(t.ok_or_else(null_target)?).map(Kind::full_name).unwrap_or_default();
            Ok(Value::Obj(w.create(Kind::Type { name })))
        },
        (_, "Equals", "i:p") => |t, a| Ok(Value::I32((t.is_some() && t == arg_obj(a, 0)) as i32)),
        (_, "ToString", "p:") => |t, _| {
            let w = world();
            let text = match w.kind(t.ok_or_else(null_target)?) {
                Some(Kind::StringBuilder { text, .. }) => text.clone(),
                Some(Kind::Exception { type_name, message, .. }) => format!("{}: {}", full_name(type_name), message),
                Some(Kind::Type { name }) => full_name(name).to_string(),
                Some(kind) => kind.full_name(),
                None => String::new(),
            };
            Ok(Value::Str(text))
        },
        (Kind::StringBuilder { .. }, "Append", "p:p") => |t, a| {
            let id = t.ok_or_else(null_target)?;
            let s = arg_str(a, 0);
            let mut w = world();
            if let Some(Kind::StringBuilder { text, max }) = w.kind_mut(id) {
                if text.chars().count() + s.chars().count() > *max {
                    return Err(Thrown::new(
                        "System.ArgumentOutOfRangeException",
                        "Specified argument was out of the range of valid values. (Parameter 'requiredLength')",
                    ));
                }
                text.push_str(&s);
            }
            Ok(Value::Obj(id))
        },
        (Kind::StringBuilder { .. }, "get_Length", "i:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::StringBuilder { text, .. }) => Ok(Value::I32(text.chars().count() as i32)),
            _ => Ok(Value::I32(0)),
        },
        (Kind::Int32Array(_) | Kind::StringArray(_), "get_Length", "i:") => |t, _| {
            match world().kind(t.ok_or_else(null_target)?) {
                Some(Kind::Int32Array(items)) => Ok(Value::I32(items.len() as i32)),
                Some(Kind::StringArray(items)) => Ok(Value::I32(items.len() as i32)),
                _ => Ok(Value::I32(0)),
            }
        },
        (Kind::Int32Array(_), "Get", "i:i") => |t, a| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::Int32Array(items)) => usize::try_from(arg_i32(a, 0))
                .ok()
                .and_then(|i| items.get(i))
                .map(|v| Value::I32(*v))
                .ok_or_else(index_out_of_range),
            _ => Ok(Value::Null),
        },
        (Kind::Int32Array(_), "Set", "v:ii") => |t, a| {
            let id = t.ok_or_else(null_target)?;
            let mut w = world();
            if let Some(Kind::Int32Array(items)) = w.kind_mut(id) {
                let slot = usize::try_from(arg_i32(a, 0))
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(index_out_of_range)?;
                *slot = arg_i32(a, 1);
            }
            Ok(Value::Void)
        },
        (Kind::StringArray(_), "Get", "p:i") => |t, a| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::StringArray(items)) => usize::try_from(arg_i32(a, 0))
                .ok()
                .and_then(|i| items.get(i))
                .map(|v| Value::Str(v.clone()))
                .ok_or_else(index_out_of_range),
            _ => Ok(Value::Null),
        },
        (Kind::StringArray(_), "Set", "v:ip") => |t, a| {
            let id = t.ok_or_else(null_target)?;
            let value = arg_str(a, 1);
            let mut w = world();
            if let Some(Kind::StringArray(items)) = w.kind_mut(id) {
                let slot = usize::try_from(arg_i32(a, 0))
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(index_out_of_range)?;
                *slot = value;
            }
            Ok(Value::Void)
        },
        (Kind::Foo { .. }, "get_Bar", "p:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::Foo { bar, .. }) => Ok(Value::Str(bar.clone())),
            _ => Ok(Value::Null),
        },
        (Kind::Foo { .. }, "set_Bar", "v:p") => foo_set_bar,
        (Kind::Foo { .. }, "set_Transformation", "v:p") => |t, a| {
            let id = t.ok_or_else(null_target)?;
            let proxy = arg_obj(a, 0);
            let mut w = world();
            if let Some(p) = proxy {
                w.pin(p);
            }
            let previous = match w.kind_mut(id) {
                Some(Kind::Foo { transformation, .. }) => std::mem::replace(transformation, proxy),
                _ => None,
            };
            if let Some(p) = previous {
                w.unpin(p);
                w.collect(p);
            }
            Ok(Value::Void)
        },
        (Kind::Foo { .. }, "get_Transformation", "p:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::Foo { transformation: Some(p), .. }) => Ok(Value::Obj(*p)),
            _ => Ok(Value::Null),
        },
        (Kind::PropertyChangedArgs { .. }, "get_PropertyName", "p:") => |t, _| {
            match world().kind(t.ok_or_else(null_target)?) {
                Some(Kind::PropertyChangedArgs { property }) => Ok(Value::Str(property.clone())),
                _ => Ok(Value::Null),
            }
        },
        (Kind::Exception { .. }, "get_Message", "p:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::Exception { message, .. }) => Ok(Value::Str(message.clone())),
            _ => Ok(Value::Null),
        },
        (Kind::Exception { .. }, "get_Source", "p:") => |_, _| Ok(Value::Str("MockRuntime".into())),
        (Kind::Exception { .. }, "get_StackTrace", "p:") => |_, _| Ok(Value::Str("   at MockRuntime.Dispatch()".into())),
        (Kind::Exception { .. }, "get_HResult", "i:") => |t, _| {
            let hresult = match world().kind(t.ok_or_else(null_target)?) {
                Some(Kind::Exception { type_name, .. }) => match full_name(type_name) {
                    "System.ArgumentOutOfRangeException" => -2146233086,
                    "System.IndexOutOfRangeException" => -2146233080,
                    "System.InvalidOperationException" => -2146233079,
                    _ => -2146233088,
                },
                _ => 0,
            };
            Ok(Value::I32(hresult))
        },
        (Kind::Exception { .. }, "get_InnerException", "p:") => |t, _| {
            match world().kind(t.ok_or_else(null_target)?) {
                Some(Kind::Exception { inner: Some(i), .. }) => Ok(Value::Obj(*i)),
                _ => Ok(Value::Null),
            }
        },
        (Kind::Type { .. }, "get_FullName", "p:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::Type { name }) => Ok(Value::Str(full_name(name).to_string())),
            _ => Ok(Value::Null),
        },
        (Kind::Type { .. }, "get_AssemblyQualifiedName", "p:") => |t, _| {
            match world().kind(t.ok_or_else(null_target)?) {
                Some(Kind::Type { name }) => Ok(Value::Str(name.clone())),
                _ => Ok(Value::Null),
            }
        },
        (Kind::SafeReturn { .. }, "get_Value", "p:" | "i:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::SafeReturn { value, .. }) => Ok(value.clone()),
            _ => Ok(Value::Null),
        },
        (Kind::SafeReturn { .. }, "get_Exception", "p:") => |t, _| match world().kind(t.ok_or_else(null_target)?) {
            Some(Kind::SafeReturn { exception: Some(e), .. }) => Ok(Value::Obj(*e)),
            _ => Ok(Value::Null),
        },
        _ => return None,
    };
    Some(member)
}

/// `Foo.Bar = value`: applies the transformation, then raises `PropertyChanged`
fn foo_set_bar(target: Option<ObjId>, args: &[Wire]) -> Result<Value, Thrown> {
    let id = target.ok_or_else(null_target)?;
    let mut value = arg_str(args, 0);

    let transform = {
        let w = world();
        match w.kind(id) {
            Some(Kind::Foo { transformation: Some(p), .. }) => match w.kind(*p) {
                Some(Kind::Proxy { methods, .. }) => methods.get("Transform").cloned(),
                _ => None,
            },
            _ => None,
        }
    };
    if let Some(method) = transform {
        value = call_string_callback(&method, &value);
    }

    let name = wide("PropertyChanged");
    let deliveries: Vec<(usize, usize, usize, usize)> = {
        let mut w = world();
        if let Some(Kind::Foo { bar, .. }) = w.kind_mut(id) {
            *bar = value;
        }
        let handlers: Vec<(usize, usize)> = w
            .events
            .iter()
            .filter(|e| e.source == id && e.name == "PropertyChanged")
            .map(|e| (e.context, e.callback))
            .collect();
        handlers
            .into_iter()
            .map(|(context, callback)| {
                let source = w.new_handle(id, false);
                let args = w.create(Kind::PropertyChangedArgs {
                    property: "Bar".to_string(),
                });
                let args = w.new_handle(args, false);
                (context, callback, source, args)
            })
            .collect()
    };

    for (context, callback, source, args) in deliveries {
        let callback: unsafe extern "system" fn(*mut c_void, *const u16, *mut c_void, *mut c_void) =
            unsafe { std::mem::transmute(callback) };
        unsafe {
            callback(
                context as *mut c_void,
                name.as_ptr(),
                source as *mut c_void,
                args as *mut c_void,
            )
        };
    }
    Ok(Value::Void)
}

/// Call a proxied `string M(string)` the way the glue component does
fn call_string_callback(method: &ProxyMethod, input: &str) -> String {
    if method.shape != "p:p" {
        return input.to_string();
    }
    let key = {
        let mut w = world();
        w.next_key += 1;
        w.next_key
    };
    let callback: unsafe extern "system" fn(*mut c_void, u64, *const u16) -> *const u16 =
        unsafe { std::mem::transmute(method.callback) };
    let input = wide(input);
    let output = unsafe { callback(method.context as *mut c_void, key, input.as_ptr()) };
    let result = unsafe { read_wide(output) };
    if method.cleanup != 0 {
        let cleanup: unsafe extern "system" fn(*mut c_void, u64) = unsafe { std::mem::transmute(method.cleanup) };
        unsafe { cleanup(method.context as *mut c_void, key) };
        world().cleanups += 1;
    }
    result
}

// ============================================================================
// Glue entry points
// ============================================================================

struct Param {
    type_name: Option<String>,
    marshal_as: Option<UnmanagedType>,
}

unsafe fn parameters(count: i32, params: *const ParameterWire) -> Vec<Param> {
    if params.is_null() || count <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(params, count as usize)
        .iter()
        .map(|p| Param {
            type_name: p.type_name(),
            marshal_as: p.info().marshal_as(),
        })
        .collect()
}

fn wire_char(marshal_as: Option<UnmanagedType>) -> Option<char> {
    match marshal_as? {
        UnmanagedType::Void => Some('v'),
        UnmanagedType::I4 | UnmanagedType::U4 | UnmanagedType::Bool => Some('i'),
        t if t.is_pointer_sized() => Some('p'),
        _ => None,
    }
}

fn shape_of(params: &[Param]) -> Option<String> {
    let (ret, args) = params.split_first()?;
    let mut shape = String::new();
    shape.push(wire_char(ret.marshal_as)?);
    shape.push(':');
    for arg in args {
        match wire_char(arg.marshal_as)? {
            'v' => return None,
            c => shape.push(c),
        }
    }
    Some(shape)
}

extern "system" fn glue_load_assembly(name: *const u16) -> i32 {
    let name = unsafe { read_wide(name) };
    let known = name == "FooLib";
    if known {
        world().loaded.push(name);
    }
    known as i32
}

extern "system" fn glue_resolve_static_method(
    type_name: *const u16,
    method: *const u16,
    count: i32,
    params: *const ParameterWire,
) -> *mut c_void {
    let (type_name, method) = unsafe { (read_wide(type_name), read_wide(method)) };
    let Some(shape) = shape_of(&unsafe { parameters(count, params) }) else {
        return std::ptr::null_mut();
    };
    let Some(member) = static_member(&type_name, &method, &shape) else {
        return std::ptr::null_mut();
    };
    let binding = Binding::Member {
        member,
        target: None,
        is_static: true,
    };
    world().bind(&shape, binding, Some(type_name))
}

extern "system" fn glue_resolve_constructor(count: i32, params: *const ParameterWire) -> *mut c_void {
    let params = unsafe { parameters(count, params) };
    let Some(type_name) = params.first().and_then(|p| p.type_name.clone()) else {
        return std::ptr::null_mut();
    };
    let Some(shape) = shape_of(&params) else {
        return std::ptr::null_mut();
    };
    let Some(member) = constructor(&type_name, &shape) else {
        return std::ptr::null_mut();
    };
    let binding = Binding::Member {
        member,
        target: None,
        is_static: true,
    };
    world().bind(&shape, binding, Some(type_name))
}

extern "system" fn glue_resolve_instance_method(
    object: *mut c_void,
    method: *const u16,
    count: i32,
    params: *const ParameterWire,
) -> *mut c_void {
    let method = unsafe { read_wide(method) };
    let Some(shape) = shape_of(&unsafe { parameters(count, params) }) else {
        return std::ptr::null_mut();
    };
    let mut w = world();
    let Some(id) = w.object(object as usize) else {
        return std::ptr::null_mut();
    };
    let Some(member) = w.kind(id).and_then(|kind| instance_member(kind, &method, &shape)) else {
        return std::ptr::null_mut();
    };
    let binding = Binding::Member {
        member,
        target: Some(id),
        is_static: false,
    };
    w.bind(&shape, binding, None)
}

extern "system" fn glue_resolve_safe_method(func: *mut c_void, count: i32, params: *const ParameterWire) -> *mut c_void {
    let Some(inner) = REVERSE.get(&(func as usize)).copied() else {
        return std::ptr::null_mut();
    };
    let Some(shape) = shape_of(&unsafe { parameters(count, params) }) else {
        return std::ptr::null_mut();
    };
    let mut w = world();
    let Some((binding, type_name)) = w.slots.get(&inner).cloned() else {
        return std::ptr::null_mut();
    };
    let safe = Binding::Safe {
        inner,
        target: binding.target(),
        is_static: binding.is_static(),
    };
    w.bind(&shape, safe, type_name)
}

extern "system" fn glue_add_event_handler(source: *mut c_void, event: *const u16, context: *mut c_void, callback: *mut c_void) {
    let name = unsafe { read_wide(event) };
    let mut w = world();
    if let Some(id) = w.object(source as usize) {
        w.events.push(EventEntry {
            source: id,
            name,
            context: context as usize,
            callback: callback as usize,
        });
    }
}

extern "system" fn glue_remove_event_handler(source: *mut c_void, event: *const u16, context: *mut c_void) {
    let name = unsafe { read_wide(event) };
    let mut w = world();
    if let Some(id) = w.object(source as usize) {
        w.events
            .retain(|e| !(e.source == id && e.name == name && e.context == context as usize));
    }
}

extern "system" fn glue_remove_all_event_handlers(source: *mut c_void) {
    let mut w = world();
    if let Some(id) = w.object(source as usize) {
        w.events.retain(|e| e.source != id);
    }
}

extern "system" fn glue_add_object_ref(object: *mut c_void, weak: i32) -> *mut c_void {
    let mut w = world();
    match w.object(object as usize) {
        Some(id) => w.new_handle(id, weak != 0) as *mut c_void,
        None => std::ptr::null_mut(),
    }
}

extern "system" fn glue_free_delegate_ref(func: *mut c_void) {
    if let Some(key) = REVERSE.get(&(func as usize)) {
        world().slots.remove(key);
    }
}

extern "system" fn glue_free_object_ref(handle: *mut c_void) {
    world().release(handle as usize);
}

extern "system" fn glue_free_type_ref(type_name: *const u16) {
    let type_name = unsafe { read_wide(type_name) };
    world()
        .slots
        .retain(|_, (binding, t)| !(binding.is_static() && t.as_deref() == Some(type_name.as_str())));
}

extern "system" fn glue_add_interface_proxy(interface: *const u16) -> *mut c_void {
    let interface = unsafe { read_wide(interface) };
    let mut w = world();
    let id = w.create(Kind::Proxy {
        interface,
        methods: HashMap::new(),
    });
    w.new_handle(id, false) as *mut c_void
}

extern "system" fn glue_set_interface_method(
    proxy: *mut c_void,
    method: *const u16,
    count: i32,
    params: *const ParameterWire,
    callback: *mut c_void,
    cleanup: *mut c_void,
    context: *mut c_void,
) {
    let method = unsafe { read_wide(method) };
    let params = unsafe { parameters(count, params) };
    // return, context, key, then the interface method's own arguments
    if params.len() < 3
        || params[1].marshal_as != Some(UnmanagedType::SysInt)
        || params[2].marshal_as != Some(UnmanagedType::U8)
    {
        return;
    }
    let mut own = Vec::with_capacity(params.len() - 2);
    let mut iter = params.into_iter();
    own.extend(iter.next());
    own.extend(iter.skip(2));
    let Some(shape) = shape_of(&own) else {
        return;
    };

    let mut w = world();
    let Some(id) = w.object(proxy as usize) else {
        return;
    };
    if let Some(Kind::Proxy { methods, .. }) = w.kind_mut(id) {
        methods.insert(
            method,
            ProxyMethod {
                shape,
                callback: callback as usize,
                cleanup: cleanup as usize,
                context: context as usize,
            },
        );
    }
}

extern "system" fn glue_stats(refs: *mut i32, statics: *mut i32, events: *mut i32) {
    let w = world();
    unsafe {
        if !refs.is_null() {
            *refs = w.handles.len() as i32;
        }
        if !statics.is_null() {
            *statics = w.slots.values().filter(|(b, _)| b.is_static()).count() as i32;
        }
        if !events.is_null() {
            *events = w.events.len() as i32;
        }
    }
}

extern "system" fn glue_get_object(object: *mut c_void, path: *const u16) -> *mut c_void {
    let path = unsafe { read_wide(path) };
    let mut w = world();
    let Some(mut current) = w.object(object as usize) else {
        return std::ptr::null_mut();
    };
    for segment in path.split('.') {
        let next = match (w.kind(current), segment) {
            (Some(Kind::Foo { transformation, .. }), "Transformation") => *transformation,
            (Some(Kind::Exception { inner, .. }), "InnerException") => *inner,
            _ => None,
        };
        match next {
            Some(id) => current = id,
            None => return std::ptr::null_mut(),
        }
    }
    w.new_handle(current, false) as *mut c_void
}

// ============================================================================
// Resolver and test setup
// ============================================================================

/// Resolves glue entry points to the functions above
pub struct MockRuntime;

impl EntryPointResolver for MockRuntime {
    fn resolve(&self, entry: &EntryPoint<'_>) -> *mut c_void {
        let func: *const () = match entry.method_name {
            "LoadAssembly" => glue_load_assembly as *const (),
            "ResolveStaticMethod" => glue_resolve_static_method as *const (),
            "ResolveConstructor" => glue_resolve_constructor as *const (),
            "ResolveInstanceMethod" => glue_resolve_instance_method as *const (),
            "ResolveSafeMethod" => glue_resolve_safe_method as *const (),
            "AddEventHandler" => glue_add_event_handler as *const (),
            "RemoveEventHandler" => glue_remove_event_handler as *const (),
            "RemoveAllEventHandlers" => glue_remove_all_event_handlers as *const (),
            "AddObjectRef" => glue_add_object_ref as *const (),
            "FreeDelegateRef" => glue_free_delegate_ref as *const (),
            "FreeObjectRef" => glue_free_object_ref as *const (),
            "FreeTypeRef" => glue_free_type_ref as *const (),
            "AddInterfaceProxy" => glue_add_interface_proxy as *const (),
            "SetInterfaceMethod" => glue_set_interface_method as *const (),
            "Stats" => glue_stats as *const (),
            "GetObject" => glue_get_object as *const (),
            _ => std::ptr::null(),
        };
        func.cast_mut().cast()
    }
}

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

/// Serialize the test and make sure the adapter runs on the mock runtime
pub fn setup() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock();
    dotnet_bridge::logging::init();
    adapter().init_with_resolver(Box::new(MockRuntime), GlueNames::default());
    guard
}
