use immuta::ImmutaProvider;

tfplug::serve_provider!(ImmutaProvider::new());
