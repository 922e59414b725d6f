//! Python 3.12 standard library module names. Modules in this set ship with
//! the interpreter and must never be turned into pip requirements.

/// Whether `module` is part of the Python standard library.
pub fn is_stdlib(module: &str) -> bool {
    matches!(
        module,
        // Text processing
        "string"
            | "re"
            | "difflib"
            | "textwrap"
            | "unicodedata"
            | "stringprep"
            | "readline"
            | "rlcompleter"
            // Binary data
            | "struct"
            | "codecs"
            // Data types
            | "datetime"
            | "zoneinfo"
            | "calendar"
            | "collections"
            | "heapq"
            | "bisect"
            | "array"
            | "weakref"
            | "types"
            | "copy"
            | "pprint"
            | "reprlib"
            | "enum"
            | "graphlib"
            // Numeric and mathematical
            | "numbers"
            | "math"
            | "cmath"
            | "decimal"
            | "fractions"
            | "random"
            | "statistics"
            // Functional programming
            | "itertools"
            | "functools"
            | "operator"
            // File and directory access
            | "pathlib"
            | "fileinput"
            | "stat"
            | "filecmp"
            | "tempfile"
            | "glob"
            | "fnmatch"
            | "linecache"
            | "shutil"
            // Data persistence
            | "pickle"
            | "copyreg"
            | "shelve"
            | "marshal"
            | "dbm"
            | "sqlite3"
            // Compression and archiving
            | "zlib"
            | "gzip"
            | "bz2"
            | "lzma"
            | "zipfile"
            | "tarfile"
            // File formats
            | "csv"
            | "configparser"
            | "tomllib"
            | "netrc"
            | "plistlib"
            // Cryptographic services
            | "hashlib"
            | "hmac"
            | "secrets"
            // Operating system services
            | "os"
            | "io"
            | "time"
            | "argparse"
            | "getopt"
            | "logging"
            | "getpass"
            | "curses"
            | "platform"
            | "errno"
            | "ctypes"
            // Concurrency
            | "threading"
            | "multiprocessing"
            | "concurrent"
            | "subprocess"
            | "sched"
            | "queue"
            | "contextvars"
            | "_thread"
            // Networking and IPC
            | "asyncio"
            | "socket"
            | "ssl"
            | "select"
            | "selectors"
            | "signal"
            | "mmap"
            // Internet data handling
            | "email"
            | "json"
            | "mailbox"
            | "mimetypes"
            | "base64"
            | "binascii"
            | "quopri"
            // Structured markup
            | "html"
            | "xml"
            // Internet protocols
            | "webbrowser"
            | "wsgiref"
            | "urllib"
            | "http"
            | "ftplib"
            | "poplib"
            | "imaplib"
            | "smtplib"
            | "uuid"
            | "socketserver"
            | "xmlrpc"
            | "ipaddress"
            // Multimedia
            | "wave"
            | "colorsys"
            // Internationalization
            | "gettext"
            | "locale"
            // Program frameworks
            | "turtle"
            | "cmd"
            | "shlex"
            // GUI
            | "tkinter"
            // Development tools
            | "typing"
            | "pydoc"
            | "doctest"
            | "unittest"
            | "test"
            // Debugging and profiling
            | "bdb"
            | "faulthandler"
            | "pdb"
            | "timeit"
            | "trace"
            | "tracemalloc"
            | "cProfile"
            | "profile"
            | "pstats"
            // Packaging and distribution
            | "ensurepip"
            | "venv"
            | "zipapp"
            // Runtime services
            | "sys"
            | "sysconfig"
            | "builtins"
            | "warnings"
            | "dataclasses"
            | "contextlib"
            | "abc"
            | "atexit"
            | "traceback"
            | "gc"
            | "inspect"
            | "site"
            // Custom interpreters
            | "code"
            | "codeop"
            // Importing
            | "importlib"
            | "pkgutil"
            | "modulefinder"
            | "runpy"
            // Language services
            | "ast"
            | "symtable"
            | "token"
            | "keyword"
            | "tokenize"
            | "tabnanny"
            | "pyclbr"
            | "py_compile"
            | "compileall"
            | "dis"
            | "pickletools"
            // Windows / Unix specific
            | "msvcrt"
            | "winreg"
            | "winsound"
            | "posix"
            | "pwd"
            | "grp"
            | "termios"
            | "tty"
            | "pty"
            | "fcntl"
            | "resource"
            | "syslog"
            // Misc
            | "__future__"
            | "__main__"
    )
}
