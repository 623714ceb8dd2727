#[cfg(feature = "bin")]
pub mod bin {
    use std::path::PathBuf;

    use clap::Parser;

    use crate::{Model, ProcessKind, Translator, TranslatorConfig};

    #[derive(Debug, Parser)]
    #[command(version = env!("FULL_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
    struct Args {
        /// Directories searched for templates and the files they import
        #[clap(short = 'I', long = "include")]
        template_paths: Vec<PathBuf>,
        /// Backend the templates must target
        #[clap(long, default_value = "cpp")]
        backend: String,
        /// Directory the translated files are written to
        #[clap(short = 'o', long, default_value = ".")]
        output_dir: PathBuf,
        /// Name of the model
        #[clap(long, default_value = "model")]
        model: String,
        /// Field names, in order
        #[clap(long = "field")]
        fields: Vec<String>,
        /// Parameter names, in order
        #[clap(long = "parameter")]
        parameters: Vec<String>,
        /// Kind of translation pass: `core` or `implementation`
        #[clap(long, default_value_t = ProcessKind::Core)]
        kind: ProcessKind,
        /// Drops blank lines from the output
        #[clap(long)]
        skip_blank: bool,
        /// Prevents printing the end-of-run report
        #[clap(long)]
        no_messages: bool,
        /// The templates to translate
        inputs: Vec<String>,
    }

    /// Output files are named after their template, without a trailing
    /// `.tpl`.
    fn output_name(template: &str) -> String {
        let file = std::path::Path::new(template)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| template.to_string());
        file.strip_suffix(".tpl").unwrap_or(&file).to_string()
    }

    /// Start the command-line interface.
    #[allow(clippy::disallowed_macros)]
    pub fn cli() {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_target(false)
            .parse_default_env()
            .init();

        let args = Args::parse();
        if args.inputs.is_empty() {
            log::error!("no templates given");
            std::process::exit(1)
        }

        let mut model = Model::new(&args.model);
        model.fields = args.fields;
        model.parameters = args.parameters;
        let mut template_paths = args.template_paths;
        template_paths.push(PathBuf::from("."));
        let config = TranslatorConfig {
            backend: args.backend,
            template_paths,
            skip_blank: args.skip_blank,
            ..TranslatorConfig::default()
        };

        let mut translator = match Translator::from_dirs(config, model) {
            Ok(translator) => translator,
            Err(err) => {
                log::error!("{err}");
                std::process::exit(1)
            }
        };
        for input in &args.inputs {
            let path = args.output_dir.join(output_name(input));
            if let Err(err) = translator.translate_to_file(input, &path, args.kind) {
                log::error!("{err}");
                std::process::exit(1)
            }
        }

        let report = translator.finish();
        if !args.no_messages {
            println!("{report}");
        }
    }

}
