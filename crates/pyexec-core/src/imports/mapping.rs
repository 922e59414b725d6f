//! Import-name to pip-package-name mapping for the cases where they differ,
//! plus popular packages whose names match (kept so lookups are cheap to
//! extend). Unknown modules pass through unchanged, which is correct for the
//! long tail of packages named after their import.

/// Pip package name for a Python module import name.
pub fn package_name(module: &str) -> &str {
    match module {
        // Image processing
        "PIL" => "Pillow",
        "cv2" => "opencv-python",
        "skimage" => "scikit-image",

        // Machine learning / data science
        "sklearn" => "scikit-learn",
        "xgboost" => "xgboost",
        "lightgbm" => "lightgbm",
        "catboost" => "catboost",
        "torch" => "torch",
        "tensorflow" => "tensorflow",
        "keras" => "keras",

        // Data manipulation
        "numpy" => "numpy",
        "pandas" => "pandas",
        "scipy" => "scipy",
        "sympy" => "sympy",
        "statsmodels" => "statsmodels",
        "pyarrow" => "pyarrow",
        "polars" => "polars",

        // Web scraping / HTTP
        "bs4" => "beautifulsoup4",
        "requests" => "requests",
        "httpx" => "httpx",
        "aiohttp" => "aiohttp",
        "urllib3" => "urllib3",
        "selenium" => "selenium",
        "scrapy" => "scrapy",
        "lxml" => "lxml",

        // Configuration / environment
        "yaml" => "PyYAML",
        "dotenv" => "python-dotenv",
        "toml" => "toml",
        "decouple" => "python-decouple",

        // Databases
        "psycopg2" => "psycopg2-binary",
        "pymysql" => "PyMySQL",
        "pymongo" => "pymongo",
        "redis" => "redis",
        "sqlalchemy" => "SQLAlchemy",
        "peewee" => "peewee",
        "motor" => "motor",
        "asyncpg" => "asyncpg",

        // Web frameworks
        "flask" => "Flask",
        "fastapi" => "fastapi",
        "django" => "Django",
        "starlette" => "starlette",
        "sanic" => "sanic",
        "bottle" => "bottle",
        "tornado" => "tornado",
        "uvicorn" => "uvicorn",
        "gunicorn" => "gunicorn",
        "pydantic" => "pydantic",

        // Testing
        "pytest" => "pytest",
        "faker" => "Faker",
        "hypothesis" => "hypothesis",
        "responses" => "responses",

        // CLI / terminal
        "click" => "click",
        "typer" => "typer",
        "rich" => "rich",
        "colorama" => "colorama",
        "tqdm" => "tqdm",
        "tabulate" => "tabulate",
        "fire" => "fire",

        // Async
        "trio" => "trio",
        "anyio" => "anyio",
        "gevent" => "gevent",
        "celery" => "celery",

        // Serialization
        "msgpack" => "msgpack",
        "orjson" => "orjson",
        "ujson" => "ujson",
        "simplejson" => "simplejson",
        "protobuf" => "protobuf",
        "avro" => "avro-python3",

        // Cryptography / security
        "cryptography" => "cryptography",
        "nacl" => "PyNaCl",
        "jwt" => "PyJWT",
        "passlib" => "passlib",
        "bcrypt" => "bcrypt",
        "paramiko" => "paramiko",

        // Cloud
        "boto3" => "boto3",
        "botocore" => "botocore",
        "google" => "google-cloud",
        "azure" => "azure",

        // Visualization
        "matplotlib" => "matplotlib",
        "seaborn" => "seaborn",
        "plotly" => "plotly",
        "bokeh" => "bokeh",
        "altair" => "altair",

        // NLP
        "nltk" => "nltk",
        "spacy" => "spacy",
        "transformers" => "transformers",
        "gensim" => "gensim",
        "textblob" => "textblob",

        // Date/time
        "dateutil" => "python-dateutil",
        "arrow" => "arrow",
        "pendulum" => "pendulum",
        "pytz" => "pytz",

        // Utilities
        "attr" | "attrs" => "attrs",
        "more_itertools" => "more-itertools",
        "toolz" => "toolz",
        "boltons" => "boltons",
        "plumbum" => "plumbum",
        "invoke" => "invoke",
        "fabric" => "fabric",

        // Logging / monitoring
        "loguru" => "loguru",
        "structlog" => "structlog",
        "sentry_sdk" => "sentry-sdk",

        // Validation
        "marshmallow" => "marshmallow",
        "cerberus" => "Cerberus",
        "voluptuous" => "voluptuous",
        "jsonschema" => "jsonschema",

        // APIs
        "graphene" => "graphene",
        "strawberry" => "strawberry-graphql",
        "grpc" => "grpcio",

        // Notebooks
        "IPython" => "ipython",
        "ipywidgets" => "ipywidgets",
        "nbformat" => "nbformat",

        // Misc
        "networkx" => "networkx",
        "igraph" => "python-igraph",
        "shapely" => "shapely",
        "fiona" => "Fiona",
        "rasterio" => "rasterio",
        "geopandas" => "geopandas",
        "folium" => "folium",
        "pygments" => "Pygments",
        "jinja2" => "Jinja2",
        "mako" => "Mako",
        "chardet" => "chardet",
        "ftfy" => "ftfy",
        "unidecode" => "Unidecode",
        "emoji" => "emoji",

        other => other,
    }
}
