//! What the subordinate runs once it is traced
//!
//! A [`Trigger`] makes the code under inspection go looking for its option
//! files. [`ConnectorTrigger`] does this for MySQL and MariaDB Connector C:
//! `mysql_options(MYSQL_READ_DEFAULT_GROUP)` followed by a
//! `mysql_real_connect` that is bound to fail before any handshake, which is
//! where the connector reads its option files.

use std::ffi::{c_char, c_int, c_uint, c_ulong, c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;

use thiserror::Error;

use crate::signal::ErrorSignal;

/// Code run inside the subordinate after tracing is set up
///
/// Returning an [`ErrorSignal`] reports it to the controller; any closure
/// with the right signature is a trigger too.
pub trait Trigger {
    fn fire(&self) -> Result<(), ErrorSignal>;
}

impl<F> Trigger for F
where
    F: Fn() -> Result<(), ErrorSignal>,
{
    fn fire(&self) -> Result<(), ErrorSignal> {
        self()
    }
}

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("library path contains a NUL byte: {0}")]
    InvalidPath(PathBuf),
}

/// `enum mysql_option` value shared by MySQL and MariaDB
const MYSQL_READ_DEFAULT_GROUP: c_int = 5;

/// Port nothing should be listening on
const UNUSED_PORT: c_uint = 3309;

type MysqlInit = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type MysqlOptions = unsafe extern "C" fn(*mut c_void, c_int, *const c_void) -> c_int;
type MysqlRealConnect = unsafe extern "C" fn(
    *mut c_void,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    c_uint,
    *const c_char,
    c_ulong,
) -> *mut c_void;

/// Loads a Connector C library and makes it read its option files
#[derive(Debug, Clone)]
pub struct ConnectorTrigger {
    library: PathBuf,
    c_library: CString,
}

impl ConnectorTrigger {
    /// The path is converted up front so the subordinate does not have to.
    pub fn new(library: impl AsRef<Path>) -> Result<Self, TriggerError> {
        let library = library.as_ref().to_path_buf();
        let c_library = CString::new(library.as_os_str().as_bytes())
            .map_err(|_| TriggerError::InvalidPath(library.clone()))?;
        Ok(Self { library, c_library })
    }

    pub fn library(&self) -> &Path {
        &self.library
    }
}

impl Trigger for ConnectorTrigger {
    fn fire(&self) -> Result<(), ErrorSignal> {
        // SAFETY: c_library is a valid NUL-terminated string.
        let handle = unsafe { libc::dlopen(self.c_library.as_ptr(), libc::RTLD_LAZY) };
        if handle.is_null() {
            return Err(ErrorSignal::new(
                "dlopen() failed --does library exist and is it Connector C?",
            ));
        }

        // SAFETY: handle comes from dlopen and the fn types match the
        // Connector C prototypes of these symbols.
        let mysql_init: MysqlInit = unsafe { resolve(handle, c"mysql_init") }.ok_or_else(|| {
            ErrorSignal::new("dlsym() failed for mysql_init() -- is this a Connector C library?")
        })?;
        let mysql_options: MysqlOptions = unsafe { resolve(handle, c"mysql_options") }
            .ok_or_else(|| {
                ErrorSignal::new(
                    "dlsym() failed for mysql_options() -- is this a Connector C library?",
                )
            })?;
        let mysql_real_connect: MysqlRealConnect =
            unsafe { resolve(handle, c"mysql_real_connect") }.ok_or_else(|| {
                ErrorSignal::new(
                    "dlsym() failed for mysql_real_connect() -- is this a Connector C library?",
                )
            })?;

        // SAFETY: mysql_init(NULL) allocates a fresh handle.
        let mysql = unsafe { mysql_init(ptr::null_mut()) };
        if mysql.is_null() {
            return Err(ErrorSignal::new("mysql_init() failed -- out of memory?"));
        }

        // Any group name will do; this only switches option file reading on.
        // SAFETY: mysql is a live handle, the value is a C string.
        let rc = unsafe {
            mysql_options(
                mysql,
                MYSQL_READ_DEFAULT_GROUP,
                c"client".as_ptr().cast::<c_void>(),
            )
        };
        if rc == 1 {
            return Err(ErrorSignal::new(
                "mysql_options() failed -- bad syntax in an option file?",
            ));
        }

        // Option files are read here; the connect itself is meant to fail.
        // SAFETY: all pointers are valid C strings or null where allowed.
        let connected = unsafe {
            mysql_real_connect(
                mysql,
                c"localhost".as_ptr(),
                c"".as_ptr(),
                c"".as_ptr(),
                c"".as_ptr(),
                UNUSED_PORT,
                ptr::null(),
                0,
            )
        };
        if !connected.is_null() {
            return Err(ErrorSignal::new(
                "mysql_real_connect() succeeded -- this is probably harmless.",
            ));
        }
        Ok(())
    }
}

/// Look up `name` in a dlopen handle as a function pointer of type `F`
///
/// # Safety
/// `handle` must come from `dlopen`, and `F` must be a function pointer type
/// matching the symbol's real signature.
unsafe fn resolve<F: Copy>(handle: *mut c_void, name: &CStr) -> Option<F> {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    // SAFETY: dlerror/dlsym are called with a valid handle and C string.
    unsafe {
        libc::dlerror();
        let symbol = libc::dlsym(handle, name.as_ptr());
        if !libc::dlerror().is_null() || symbol.is_null() {
            return None;
        }
        Some(std::mem::transmute_copy::<*mut c_void, F>(&symbol))
    }
}
