#[cfg(feature = "scip")]
use crate::ffi;

/// Return codes of the SCIP library.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Retcode {
    /// Normal termination.
    Okay,
    /// Unspecified error.
    Error,
    /// Insufficient memory error.
    NoMemory,
    /// Read error.
    ReadError,
    /// Write error.
    WriteError,
    /// File not found error.
    NoFile,
    /// Cannot create file.
    FileCreateError,
    /// Error in LP solver.
    LpError,
    /// No problem exists.
    NoProblem,
    /// Method cannot be called at this time in solution process.
    InvalidCall,
    /// Error in input data.
    InvalidData,
    /// Method returned an invalid result code.
    InvalidResult,
    /// A required plugin was not found.
    PluginNotFound,
    /// The parameter with the given name was not found.
    ParameterUnknown,
    /// The parameter is not of the expected type.
    ParameterWrongType,
    /// The value is invalid for the given parameter.
    ParameterWrongVal,
    /// The given key is already existing in table.
    KeyAlreadyExisting,
    /// Maximal branching depth level exceeded.
    MaxDepthLevel,
    /// No branching could be created.
    BranchError,
    /// Function not implemented.
    NotImplemented,
    /// A code this crate does not know about.
    Unknown(i32),
}

#[cfg(feature = "scip")]
impl From<ffi::SCIP_Retcode> for Retcode {
    fn from(val: ffi::SCIP_Retcode) -> Self {
        match val {
            ffi::SCIP_Retcode_SCIP_OKAY => Retcode::Okay,
            ffi::SCIP_Retcode_SCIP_ERROR => Retcode::Error,
            ffi::SCIP_Retcode_SCIP_NOMEMORY => Retcode::NoMemory,
            ffi::SCIP_Retcode_SCIP_READERROR => Retcode::ReadError,
            ffi::SCIP_Retcode_SCIP_WRITEERROR => Retcode::WriteError,
            ffi::SCIP_Retcode_SCIP_NOFILE => Retcode::NoFile,
            ffi::SCIP_Retcode_SCIP_FILECREATEERROR => Retcode::FileCreateError,
            ffi::SCIP_Retcode_SCIP_LPERROR => Retcode::LpError,
            ffi::SCIP_Retcode_SCIP_NOPROBLEM => Retcode::NoProblem,
            ffi::SCIP_Retcode_SCIP_INVALIDCALL => Retcode::InvalidCall,
            ffi::SCIP_Retcode_SCIP_INVALIDDATA => Retcode::InvalidData,
            ffi::SCIP_Retcode_SCIP_INVALIDRESULT => Retcode::InvalidResult,
            ffi::SCIP_Retcode_SCIP_PLUGINNOTFOUND => Retcode::PluginNotFound,
            ffi::SCIP_Retcode_SCIP_PARAMETERUNKNOWN => Retcode::ParameterUnknown,
            ffi::SCIP_Retcode_SCIP_PARAMETERWRONGTYPE => Retcode::ParameterWrongType,
            ffi::SCIP_Retcode_SCIP_PARAMETERWRONGVAL => Retcode::ParameterWrongVal,
            ffi::SCIP_Retcode_SCIP_KEYALREADYEXISTING => Retcode::KeyAlreadyExisting,
            ffi::SCIP_Retcode_SCIP_MAXDEPTHLEVEL => Retcode::MaxDepthLevel,
            ffi::SCIP_Retcode_SCIP_BRANCHERROR => Retcode::BranchError,
            ffi::SCIP_Retcode_SCIP_NOTIMPLEMENTED => Retcode::NotImplemented,
            other => Retcode::Unknown(other as i32),
        }
    }
}

#[cfg(feature = "scip")]
impl From<Retcode> for ffi::SCIP_Retcode {
    fn from(val: Retcode) -> Self {
        match val {
            Retcode::Okay => ffi::SCIP_Retcode_SCIP_OKAY,
            Retcode::Error => ffi::SCIP_Retcode_SCIP_ERROR,
            Retcode::NoMemory => ffi::SCIP_Retcode_SCIP_NOMEMORY,
            Retcode::ReadError => ffi::SCIP_Retcode_SCIP_READERROR,
            Retcode::WriteError => ffi::SCIP_Retcode_SCIP_WRITEERROR,
            Retcode::NoFile => ffi::SCIP_Retcode_SCIP_NOFILE,
            Retcode::FileCreateError => ffi::SCIP_Retcode_SCIP_FILECREATEERROR,
            Retcode::LpError => ffi::SCIP_Retcode_SCIP_LPERROR,
            Retcode::NoProblem => ffi::SCIP_Retcode_SCIP_NOPROBLEM,
            Retcode::InvalidCall => ffi::SCIP_Retcode_SCIP_INVALIDCALL,
            Retcode::InvalidData => ffi::SCIP_Retcode_SCIP_INVALIDDATA,
            Retcode::InvalidResult => ffi::SCIP_Retcode_SCIP_INVALIDRESULT,
            Retcode::PluginNotFound => ffi::SCIP_Retcode_SCIP_PLUGINNOTFOUND,
            Retcode::ParameterUnknown => ffi::SCIP_Retcode_SCIP_PARAMETERUNKNOWN,
            Retcode::ParameterWrongType => ffi::SCIP_Retcode_SCIP_PARAMETERWRONGTYPE,
            Retcode::ParameterWrongVal => ffi::SCIP_Retcode_SCIP_PARAMETERWRONGVAL,
            Retcode::KeyAlreadyExisting => ffi::SCIP_Retcode_SCIP_KEYALREADYEXISTING,
            Retcode::MaxDepthLevel => ffi::SCIP_Retcode_SCIP_MAXDEPTHLEVEL,
            Retcode::BranchError => ffi::SCIP_Retcode_SCIP_BRANCHERROR,
            Retcode::NotImplemented => ffi::SCIP_Retcode_SCIP_NOTIMPLEMENTED,
            Retcode::Unknown(code) => code as ffi::SCIP_Retcode,
        }
    }
}

/// Calls a SCIP function and returns early with the [`Retcode`] if it is not `Okay`.
#[cfg(feature = "scip")]
macro_rules! scip_call {
    ($res:expr) => {
        let retcode = $crate::retcode::Retcode::from(unsafe { $res });
        if retcode != $crate::retcode::Retcode::Okay {
            return Err(retcode.into());
        }
    };
}

#[cfg(feature = "scip")]
pub(crate) use scip_call;
