//! An in-memory JVM for integration tests.
//!
//! `MockBridge` implements `NativeBridge` over a tiny object model: classes
//! with methods and fields, instances, strings and byte arrays. Every
//! reference it hands out is a distinct fake pointer recorded with its scope,
//! so tests can count live references, lookups and double frees.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jni_bridge::sys::{
    jbyte, jbyteArray, jclass, jfieldID, jint, jmethodID, jobject, jsize, jstring, jvalue, JNIEnv,
    JNI_EDETACHED, JNI_ERR,
};
use jni_bridge::{ClassName, EnvPtr, JavaRuntime, NativeBridge, TracingObserver};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing_subscriber::EnvFilter;

const FAKE_ENV: usize = 0xE0;

thread_local! {
    // no destructor, so it stays readable while other thread-locals are torn down
    static THREAD_MARK: u8 = const { 0 };
}

/// Identifies the calling thread, even from inside thread-local destructors.
fn thread_key() -> usize {
    THREAD_MARK.with(|mark| mark as *const u8 as usize)
}

/// What a mocked method does when called.
#[derive(Debug, Clone)]
pub enum Behavior {
    Void,
    ReturnInt(i32),
    ReturnString(String),
    ReturnThis,
    ReturnNull,
    ReturnNewObject(String),
    /// `String.length()`
    StringLength,
    /// `Class.getName()`
    ClassName,
    /// `ClassLoader.loadClass(String)`, sees hidden classes too
    LoadClass,
    /// Stores the first int argument into the named field of the receiver.
    StoreInt(String),
    Throw,
}

/// Initial value of a mocked field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Int(i32),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Local,
    Global,
    /// Owned by the "Java" side (native method arguments); never deleted by the bridge.
    External,
}

#[derive(Debug, Clone)]
enum Referent {
    Class(String),
    /// `class_object` is set when the instance belongs to a class object other
    /// than the one registered under its name (a second loader's copy).
    Instance {
        class: String,
        class_object: Option<usize>,
        ints: FxHashMap<String, i32>,
    },
    Str(String),
    Bytes(Vec<jbyte>),
}

#[derive(Debug, Clone)]
struct MethodDef {
    name: String,
    sig: String,
    is_static: bool,
    behavior: Behavior,
}

#[derive(Debug, Clone)]
struct FieldDef {
    name: String,
    sig: String,
    is_static: bool,
    initial: FieldValue,
}

#[derive(Debug, Clone)]
struct ClassDef {
    superclass: Option<String>,
    visible: bool,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
enum Member {
    Method { name: String, behavior: Behavior },
    Field { name: String, initial: FieldValue },
}

/// Call and reference counters.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub find_class: FxHashMap<String, usize>,
    pub method_lookups: usize,
    pub field_lookups: usize,
    pub attaches: usize,
    pub detaches: usize,
    pub invocations: FxHashMap<String, usize>,
    pub globals_created: usize,
    pub global_deletes: usize,
    pub local_deletes: usize,
    pub double_frees: usize,
    /// Bridge calls made on a thread that was not attached.
    pub detached_uses: usize,
}

#[derive(Default)]
struct World {
    next_id: usize,
    referents: FxHashMap<usize, Referent>,
    refs: FxHashMap<usize, (Scope, usize)>,
    class_objects: FxHashMap<String, usize>,
    classes: FxHashMap<String, ClassDef>,
    members: FxHashMap<usize, Member>,
    member_ids: FxHashMap<(String, String, String, bool, bool), usize>,
    pending: FxHashSet<usize>,
    attached: FxHashSet<usize>,
    stats: Stats,
}

enum Ret {
    Void,
    Int(jint),
    Obj(jobject),
}

impl World {
    fn alloc(&mut self) -> usize {
        self.next_id += 0x10;
        0x1000 + self.next_id
    }

    fn referent(&mut self, referent: Referent) -> usize {
        let id = self.alloc();
        self.referents.insert(id, referent);
        id
    }

    fn new_ref(&mut self, scope: Scope, referent: usize) -> jobject {
        let id = self.alloc();
        self.refs.insert(id, (scope, referent));
        id as jobject
    }

    fn target(&self, obj: jobject) -> Option<usize> {
        self.refs.get(&(obj as usize)).map(|(_, referent)| *referent)
    }

    fn class_object(&mut self, name: &str) -> usize {
        if let Some(id) = self.class_objects.get(name) {
            return *id;
        }
        let id = self.referent(Referent::Class(name.to_owned()));
        self.class_objects.insert(name.to_owned(), id);
        id
    }

    fn class_of_ref(&self, class: jclass) -> Option<String> {
        match self.referents.get(&self.target(class)?)? {
            Referent::Class(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn string(&mut self, value: &str, scope: Scope) -> jobject {
        let id = self.referent(Referent::Str(value.to_owned()));
        self.new_ref(scope, id)
    }

    fn instance(&mut self, class: &str, scope: Scope) -> jobject {
        let id = self.referent(Referent::Instance {
            class: class.to_owned(),
            class_object: None,
            ints: FxHashMap::default(),
        });
        self.new_ref(scope, id)
    }

    fn member_id(&mut self, key: (String, String, String, bool, bool), member: Member) -> usize {
        if let Some(id) = self.member_ids.get(&key) {
            return *id;
        }
        let id = self.alloc();
        self.member_ids.insert(key, id);
        self.members.insert(id, member);
        id
    }

    fn find_method(&mut self, class: &str, name: &str, sig: &str, is_static: bool) -> Option<usize> {
        let mut current = Some(class.to_owned());
        while let Some(class_name) = current {
            let (found, superclass) = {
                let def = self.classes.get(&class_name)?;
                let found = def
                    .methods
                    .iter()
                    .find(|m| m.name == name && m.sig == sig && m.is_static == is_static)
                    .cloned();
                (found, def.superclass.clone())
            };
            if let Some(m) = found {
                let key = (class_name, m.name.clone(), m.sig.clone(), is_static, false);
                let member = Member::Method {
                    name: m.name,
                    behavior: m.behavior,
                };
                return Some(self.member_id(key, member));
            }
            // constructors are not inherited
            if name == "<init>" {
                return None;
            }
            current = superclass;
        }
        None
    }

    fn find_field(&mut self, class: &str, name: &str, sig: &str, is_static: bool) -> Option<usize> {
        let mut current = Some(class.to_owned());
        while let Some(class_name) = current {
            let (found, superclass) = {
                let def = self.classes.get(&class_name)?;
                let found = def
                    .fields
                    .iter()
                    .find(|f| f.name == name && f.sig == sig && f.is_static == is_static)
                    .cloned();
                (found, def.superclass.clone())
            };
            if let Some(f) = found {
                let key = (class_name, f.name.clone(), f.sig.clone(), is_static, true);
                let member = Member::Field {
                    name: f.name,
                    initial: f.initial,
                };
                return Some(self.member_id(key, member));
            }
            current = superclass;
        }
        None
    }

    fn throw(&mut self) {
        self.pending.insert(thread_key());
    }

    fn dispatch(&mut self, target: jobject, method: jmethodID, args: &[jvalue]) -> Ret {
        let Some(Member::Method { name, behavior }) = self.members.get(&(method as usize)).cloned() else {
            return Ret::Void;
        };
        *self.stats.invocations.entry(name).or_default() += 1;
        let receiver = self.target(target);
        match behavior {
            Behavior::Void => Ret::Void,
            Behavior::ReturnInt(v) => Ret::Int(v),
            Behavior::ReturnString(s) => Ret::Obj(self.string(&s, Scope::Local)),
            Behavior::ReturnThis => match receiver {
                Some(r) => Ret::Obj(self.new_ref(Scope::Local, r)),
                None => Ret::Obj(std::ptr::null_mut()),
            },
            Behavior::ReturnNull => Ret::Obj(std::ptr::null_mut()),
            Behavior::ReturnNewObject(class) => Ret::Obj(self.instance(&class, Scope::Local)),
            Behavior::StringLength => match receiver.and_then(|r| self.referents.get(&r)) {
                Some(Referent::Str(s)) => Ret::Int(s.chars().count() as jint),
                _ => Ret::Int(0),
            },
            Behavior::ClassName => match receiver.and_then(|r| self.referents.get(&r)).cloned() {
                Some(Referent::Class(name)) => Ret::Obj(self.string(&name.replace('/', "."), Scope::Local)),
                _ => Ret::Obj(std::ptr::null_mut()),
            },
            Behavior::LoadClass => {
                let arg = args.first().map(|v| unsafe { v.l }).unwrap_or(std::ptr::null_mut());
                let requested = match self.target(arg).and_then(|r| self.referents.get(&r)) {
                    Some(Referent::Str(s)) => Some(ClassName::new(s.as_str())),
                    _ => None,
                };
                match requested {
                    Some(name) if self.classes.contains_key(name.as_str()) => {
                        let class = self.class_object(name.as_str());
                        Ret::Obj(self.new_ref(Scope::Local, class))
                    }
                    _ => {
                        self.throw();
                        Ret::Obj(std::ptr::null_mut())
                    }
                }
            }
            Behavior::StoreInt(field) => {
                let value = args.first().map(|v| unsafe { v.i }).unwrap_or(0);
                if let Some(Referent::Instance { ints, .. }) = receiver.and_then(|r| self.referents.get_mut(&r)) {
                    ints.insert(field, value);
                }
                Ret::Void
            }
            Behavior::Throw => {
                self.throw();
                Ret::Void
            }
        }
    }

    fn delete(&mut self, obj: jobject, scope: Scope) {
        match self.refs.get(&(obj as usize)) {
            Some((found, _)) if *found == scope => {
                self.refs.remove(&(obj as usize));
                match scope {
                    Scope::Global => self.stats.global_deletes += 1,
                    _ => self.stats.local_deletes += 1,
                }
            }
            _ => self.stats.double_frees += 1,
        }
    }

    fn define(&mut self, name: &str, superclass: Option<&str>, visible: bool) {
        let name = ClassName::new(name);
        self.classes.entry(name.as_str().to_owned()).or_insert_with(|| ClassDef {
            superclass: superclass.map(|s| ClassName::new(s).as_str().to_owned()),
            visible,
            methods: Vec::new(),
            fields: Vec::new(),
        });
    }

    fn class_mut(&mut self, name: &str) -> &mut ClassDef {
        let name = ClassName::new(name);
        self.define(name.as_str(), Some("java/lang/Object"), true);
        self.classes
            .get_mut(name.as_str())
            .expect("class was just defined")
    }
}

/// An in-memory stand-in for a JVM.
pub struct MockBridge {
    world: Mutex<World>,
    fail_attach: AtomicBool,
    fail_promotion: AtomicBool,
    lookup_delay: Mutex<Option<Duration>>,
}

impl MockBridge {
    /// A world with `Object`, `String`, `Class` and `ClassLoader`.
    pub fn new() -> Arc<Self> {
        let mock = MockBridge {
            world: Mutex::new(World::default()),
            fail_attach: AtomicBool::new(false),
            fail_promotion: AtomicBool::new(false),
            lookup_delay: Mutex::new(None),
        };
        {
            let mut w = mock.world.lock();
            w.define("java/lang/Object", None, true);
        }
        mock.method("java/lang/Object", "<init>", "()V", Behavior::Void)
            .method("java/lang/Object", "hashCode", "()I", Behavior::ReturnInt(42))
            .method(
                "java/lang/Object",
                "toString",
                "()Ljava/lang/String;",
                Behavior::ReturnString("java.lang.Object@2a".into()),
            )
            .method("java/lang/String", "toString", "()Ljava/lang/String;", Behavior::ReturnThis)
            .method("java/lang/String", "length", "()I", Behavior::StringLength)
            .method("java/lang/Class", "getName", "()Ljava/lang/String;", Behavior::ClassName)
            .method(
                "java/lang/ClassLoader",
                "loadClass",
                "(Ljava/lang/String;)Ljava/lang/Class;",
                Behavior::LoadClass,
            );
        Arc::new(mock)
    }

    // =========================================================================
    // World setup
    // =========================================================================

    pub fn class(&self, name: &str) -> &Self {
        self.world.lock().class_mut(name);
        self
    }

    pub fn subclass(&self, name: &str, superclass: &str) -> &Self {
        self.world.lock().define(name, Some(superclass), true);
        self
    }

    /// A class only reachable through `ClassLoader.loadClass`.
    pub fn hidden_class(&self, name: &str) -> &Self {
        self.world.lock().define(name, Some("java/lang/Object"), false);
        self
    }

    pub fn set_visible(&self, name: &str, visible: bool) -> &Self {
        self.world.lock().class_mut(name).visible = visible;
        self
    }

    pub fn method(&self, class: &str, name: &str, sig: &str, behavior: Behavior) -> &Self {
        self.add_method(class, name, sig, false, behavior)
    }

    pub fn static_method(&self, class: &str, name: &str, sig: &str, behavior: Behavior) -> &Self {
        self.add_method(class, name, sig, true, behavior)
    }

    fn add_method(&self, class: &str, name: &str, sig: &str, is_static: bool, behavior: Behavior) -> &Self {
        self.world.lock().class_mut(class).methods.push(MethodDef {
            name: name.to_owned(),
            sig: sig.to_owned(),
            is_static,
            behavior,
        });
        self
    }

    pub fn field(&self, class: &str, name: &str, sig: &str, initial: FieldValue) -> &Self {
        self.add_field(class, name, sig, false, initial)
    }

    pub fn static_field(&self, class: &str, name: &str, sig: &str, initial: FieldValue) -> &Self {
        self.add_field(class, name, sig, true, initial)
    }

    fn add_field(&self, class: &str, name: &str, sig: &str, is_static: bool, initial: FieldValue) -> &Self {
        self.world.lock().class_mut(class).fields.push(FieldDef {
            name: name.to_owned(),
            sig: sig.to_owned(),
            is_static,
            initial,
        });
        self
    }

    pub fn set_fail_attach(&self, value: bool) {
        self.fail_attach.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_promotion(&self, value: bool) {
        self.fail_promotion.store(value, Ordering::SeqCst);
    }

    /// Slows down class and member lookups to widen race windows.
    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.lookup_delay.lock() = Some(delay);
    }

    // =========================================================================
    // Objects owned by the "Java" side
    // =========================================================================

    /// A new instance, referenced the way a native method argument would be.
    pub fn external_object(&self, class: &str) -> jobject {
        let class = ClassName::new(class);
        self.world.lock().instance(class.as_str(), Scope::External)
    }

    pub fn external_string(&self, value: &str) -> jobject {
        self.world.lock().string(value, Scope::External)
    }

    pub fn external_class(&self, name: &str) -> jclass {
        let name = ClassName::new(name);
        let mut w = self.world.lock();
        let class = w.class_object(name.as_str());
        w.new_ref(Scope::External, class)
    }

    /// A class object named `name` that is not the one `FindClass` returns,
    /// as if a second class loader had defined the same class.
    pub fn shadow_class(&self, name: &str) -> jclass {
        let name = ClassName::new(name);
        let mut w = self.world.lock();
        w.class_mut(name.as_str());
        let class = w.referent(Referent::Class(name.as_str().to_owned()));
        w.new_ref(Scope::External, class)
    }

    /// A new external instance of the class object `class` refers to.
    pub fn instance_of(&self, class: jclass) -> jobject {
        let mut w = self.world.lock();
        let class_object = w.target(class).expect("live class reference");
        let name = w.class_of_ref(class).expect("reference to a class");
        let id = w.referent(Referent::Instance {
            class: name,
            class_object: Some(class_object),
            ints: FxHashMap::default(),
        });
        w.new_ref(Scope::External, id)
    }

    /// A local reference to any defined class, hidden or not.
    pub fn mint_local_class(&self, name: &str) -> Option<jclass> {
        let name = ClassName::new(name);
        let mut w = self.world.lock();
        if !w.classes.contains_key(name.as_str()) {
            return None;
        }
        let class = w.class_object(name.as_str());
        Some(w.new_ref(Scope::Local, class))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn stats(&self) -> Stats {
        self.world.lock().stats.clone()
    }

    pub fn find_class_calls(&self, name: &str) -> usize {
        let name = ClassName::new(name);
        self.world
            .lock()
            .stats
            .find_class
            .get(name.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn invocations(&self, method: &str) -> usize {
        self.world.lock().stats.invocations.get(method).copied().unwrap_or(0)
    }

    pub fn live_globals(&self) -> usize {
        self.count(Scope::Global)
    }

    pub fn live_locals(&self) -> usize {
        self.count(Scope::Local)
    }

    fn count(&self, scope: Scope) -> usize {
        self.world.lock().refs.values().filter(|(s, _)| *s == scope).count()
    }

    pub fn double_frees(&self) -> usize {
        self.world.lock().stats.double_frees
    }

    pub fn detached_uses(&self) -> usize {
        self.world.lock().stats.detached_uses
    }

    /// Detaches the calling thread the way a host would, without telling the
    /// runtime.
    pub fn host_detach(&self) {
        self.world.lock().attached.remove(&thread_key());
    }

    /// Whether `obj` is a live reference of any scope.
    pub fn is_live(&self, obj: jobject) -> bool {
        self.world.lock().refs.contains_key(&(obj as usize))
    }

    /// Whether two references point at the same object.
    pub fn same_object(&self, a: jobject, b: jobject) -> bool {
        let w = self.world.lock();
        match (w.target(a), w.target(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The class name of whatever `obj` refers to.
    pub fn class_name_of(&self, obj: jobject) -> Option<String> {
        let w = self.world.lock();
        match w.referents.get(&w.target(obj)?)? {
            Referent::Class(_) => Some("java/lang/Class".to_owned()),
            Referent::Instance { class, .. } => Some(class.clone()),
            Referent::Str(_) => Some("java/lang/String".to_owned()),
            Referent::Bytes(_) => Some("[B".to_owned()),
        }
    }

    /// Counts a bridge call made while the calling thread is detached.
    fn check_attached(&self) {
        let mut w = self.world.lock();
        if !w.attached.contains(&thread_key()) {
            w.stats.detached_uses += 1;
        }
    }

    fn pause(&self) {
        let delay = *self.lookup_delay.lock();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }
}

fn fake_env() -> Result<EnvPtr, jint> {
    unsafe { EnvPtr::from_raw(FAKE_ENV as *mut JNIEnv) }.ok_or(JNI_ERR)
}

impl NativeBridge for MockBridge {
    fn get_env(&self) -> Result<EnvPtr, jint> {
        if self.world.lock().attached.contains(&thread_key()) {
            fake_env()
        } else {
            Err(JNI_EDETACHED)
        }
    }

    fn attach_current_thread(&self) -> Result<EnvPtr, jint> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(JNI_ERR);
        }
        let mut w = self.world.lock();
        w.stats.attaches += 1;
        w.attached.insert(thread_key());
        fake_env()
    }

    fn detach_current_thread(&self) -> Result<(), jint> {
        let mut w = self.world.lock();
        w.stats.detaches += 1;
        w.attached.remove(&thread_key());
        Ok(())
    }

    fn find_class(&self, _env: EnvPtr, name: &str) -> Option<jclass> {
        self.check_attached();
        self.pause();
        let mut w = self.world.lock();
        *w.stats.find_class.entry(name.to_owned()).or_default() += 1;
        if !w.classes.get(name)?.visible {
            return None;
        }
        let class = w.class_object(name);
        Some(w.new_ref(Scope::Local, class))
    }

    fn get_method_id(&self, _env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        self.check_attached();
        self.pause();
        let mut w = self.world.lock();
        w.stats.method_lookups += 1;
        let class = w.class_of_ref(class)?;
        w.find_method(&class, name, sig, false).map(|id| id as jmethodID)
    }

    fn get_static_method_id(&self, _env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jmethodID> {
        self.pause();
        let mut w = self.world.lock();
        w.stats.method_lookups += 1;
        let class = w.class_of_ref(class)?;
        w.find_method(&class, name, sig, true).map(|id| id as jmethodID)
    }

    fn get_field_id(&self, _env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        let mut w = self.world.lock();
        w.stats.field_lookups += 1;
        let class = w.class_of_ref(class)?;
        w.find_field(&class, name, sig, false).map(|id| id as jfieldID)
    }

    fn get_static_field_id(&self, _env: EnvPtr, class: jclass, name: &str, sig: &str) -> Option<jfieldID> {
        let mut w = self.world.lock();
        w.stats.field_lookups += 1;
        let class = w.class_of_ref(class)?;
        w.find_field(&class, name, sig, true).map(|id| id as jfieldID)
    }

    fn get_object_class(&self, _env: EnvPtr, obj: jobject) -> Option<jclass> {
        let mut w = self.world.lock();
        let (name, bound) = match w.referents.get(&w.target(obj)?)? {
            Referent::Instance {
                class, class_object, ..
            } => (class.clone(), *class_object),
            Referent::Class(_) => ("java/lang/Class".to_owned(), None),
            Referent::Str(_) => ("java/lang/String".to_owned(), None),
            Referent::Bytes(_) => ("[B".to_owned(), None),
        };
        let class = match bound {
            Some(id) => id,
            None => w.class_object(&name),
        };
        Some(w.new_ref(Scope::Local, class))
    }

    fn new_global_ref(&self, _env: EnvPtr, obj: jobject) -> Option<jobject> {
        self.check_attached();
        if self.fail_promotion.load(Ordering::SeqCst) {
            return None;
        }
        let mut w = self.world.lock();
        let target = w.target(obj)?;
        w.stats.globals_created += 1;
        Some(w.new_ref(Scope::Global, target))
    }

    fn delete_global_ref(&self, _env: EnvPtr, obj: jobject) {
        self.check_attached();
        self.world.lock().delete(obj, Scope::Global);
    }

    fn delete_local_ref(&self, _env: EnvPtr, obj: jobject) {
        self.check_attached();
        self.world.lock().delete(obj, Scope::Local);
    }

    fn is_same_object(&self, _env: EnvPtr, a: jobject, b: jobject) -> bool {
        let w = self.world.lock();
        w.target(a) == w.target(b)
    }

    fn new_object(&self, _env: EnvPtr, class: jclass, ctor: jmethodID, args: &[jvalue]) -> Option<jobject> {
        let mut w = self.world.lock();
        let class = w.class_of_ref(class)?;
        let Some(Member::Method { name, behavior }) = w.members.get(&(ctor as usize)).cloned() else {
            return None;
        };
        *w.stats.invocations.entry(name).or_default() += 1;
        match behavior {
            Behavior::Throw => {
                w.throw();
                None
            }
            Behavior::StoreInt(field) => {
                let value = args.first().map(|v| unsafe { v.i }).unwrap_or(0);
                let obj = w.instance(&class, Scope::Local);
                let target = w.target(obj)?;
                if let Some(Referent::Instance { ints, .. }) = w.referents.get_mut(&target) {
                    ints.insert(field, value);
                }
                Some(obj)
            }
            _ => Some(w.instance(&class, Scope::Local)),
        }
    }

    fn call_object_method(&self, _env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jobject {
        match self.world.lock().dispatch(obj, method, args) {
            Ret::Obj(obj) => obj,
            _ => std::ptr::null_mut(),
        }
    }

    fn call_int_method(&self, _env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) -> jint {
        match self.world.lock().dispatch(obj, method, args) {
            Ret::Int(v) => v,
            _ => 0,
        }
    }

    fn call_void_method(&self, _env: EnvPtr, obj: jobject, method: jmethodID, args: &[jvalue]) {
        self.world.lock().dispatch(obj, method, args);
    }

    fn call_static_object_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jobject {
        self.call_object_method(env, class, method, args)
    }

    fn call_static_int_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) -> jint {
        self.call_int_method(env, class, method, args)
    }

    fn call_static_void_method(&self, env: EnvPtr, class: jclass, method: jmethodID, args: &[jvalue]) {
        self.call_void_method(env, class, method, args)
    }

    fn get_object_field(&self, _env: EnvPtr, _obj: jobject, field: jfieldID) -> jobject {
        let mut w = self.world.lock();
        match w.members.get(&(field as usize)).cloned() {
            Some(Member::Field {
                initial: FieldValue::Str(s),
                ..
            }) => w.string(&s, Scope::Local),
            _ => std::ptr::null_mut(),
        }
    }

    fn get_int_field(&self, _env: EnvPtr, obj: jobject, field: jfieldID) -> jint {
        let w = self.world.lock();
        let Some(Member::Field { name, initial }) = w.members.get(&(field as usize)) else {
            return 0;
        };
        let stored = w.target(obj).and_then(|r| match w.referents.get(&r) {
            Some(Referent::Instance { ints, .. }) => ints.get(name).copied(),
            _ => None,
        });
        match (stored, initial) {
            (Some(v), _) => v,
            (None, FieldValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn set_int_field(&self, _env: EnvPtr, obj: jobject, field: jfieldID, value: jint) {
        let mut w = self.world.lock();
        let Some(Member::Field { name, .. }) = w.members.get(&(field as usize)).cloned() else {
            return;
        };
        if let Some(target) = w.target(obj) {
            if let Some(Referent::Instance { ints, .. }) = w.referents.get_mut(&target) {
                ints.insert(name, value);
            }
        }
    }

    fn get_static_object_field(&self, env: EnvPtr, class: jclass, field: jfieldID) -> jobject {
        self.get_object_field(env, class, field)
    }

    fn exception_check(&self, _env: EnvPtr) -> bool {
        self.world.lock().pending.contains(&thread_key())
    }

    fn exception_clear(&self, _env: EnvPtr) {
        self.world.lock().pending.remove(&thread_key());
    }

    fn new_string_utf(&self, _env: EnvPtr, value: &str) -> Option<jstring> {
        Some(self.world.lock().string(value, Scope::Local))
    }

    fn get_string_utf(&self, _env: EnvPtr, value: jstring) -> Option<String> {
        let w = self.world.lock();
        match w.referents.get(&w.target(value)?)? {
            Referent::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn new_byte_array(&self, _env: EnvPtr, len: jsize) -> Option<jbyteArray> {
        let len = usize::try_from(len).ok()?;
        let mut w = self.world.lock();
        let id = w.referent(Referent::Bytes(vec![0; len]));
        Some(w.new_ref(Scope::Local, id))
    }

    fn get_array_length(&self, _env: EnvPtr, array: jbyteArray) -> jsize {
        let w = self.world.lock();
        match w.target(array).and_then(|r| w.referents.get(&r)) {
            Some(Referent::Bytes(bytes)) => bytes.len() as jsize,
            _ => 0,
        }
    }

    fn get_byte_array_region(&self, _env: EnvPtr, array: jbyteArray, start: jsize, buf: &mut [jbyte]) {
        let w = self.world.lock();
        if let Some(Referent::Bytes(bytes)) = w.target(array).and_then(|r| w.referents.get(&r)) {
            let start = start as usize;
            buf.copy_from_slice(&bytes[start..start + buf.len()]);
        }
    }

    fn set_byte_array_region(&self, _env: EnvPtr, array: jbyteArray, start: jsize, buf: &[jbyte]) {
        let mut w = self.world.lock();
        if let Some(target) = w.target(array) {
            if let Some(Referent::Bytes(bytes)) = w.referents.get_mut(&target) {
                let start = start as usize;
                bytes[start..start + buf.len()].copy_from_slice(buf);
            }
        }
    }
}

/// Prints hook events when run with `RUST_LOG=jni_bridge=trace`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A runtime over `mock` with default settings and the tracing observer.
pub fn runtime(mock: &Arc<MockBridge>) -> JavaRuntime {
    init_tracing();
    JavaRuntime::builder(Arc::clone(mock) as Arc<dyn NativeBridge>)
        .observer(Arc::new(TracingObserver))
        .build()
}
