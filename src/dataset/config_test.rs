use super::*;

#[test]
fn test_step_relpath_naming() {
    let t = crate::time::Time::new(2007, 7, 8, 0, 0, 0);
    assert_eq!(Step::Yearly.relpath(&t, DataFormat::Grib, "ds").to_str().unwrap(), "2007.grib");
    assert_eq!(Step::Monthly.relpath(&t, DataFormat::Grib, "ds").to_str().unwrap(), "2007/07.grib");
    assert_eq!(Step::Daily.relpath(&t, DataFormat::Grib, "ds").to_str().unwrap(), "2007/07-08.grib");
    assert_eq!(Step::Singlefile.relpath(&t, DataFormat::Grib, "ds").to_str().unwrap(), "ds.grib");
}

#[test]
fn test_weekly_step_buckets_by_week_of_month() {
    let t1 = crate::time::Time::new(2007, 7, 1, 0, 0, 0);
    let t2 = crate::time::Time::new(2007, 7, 8, 0, 0, 0);
    assert_eq!(Step::Weekly.relpath(&t1, DataFormat::Grib, "ds").to_str().unwrap(), "2007/07-01.grib");
    assert_eq!(Step::Weekly.relpath(&t2, DataFormat::Grib, "ds").to_str().unwrap(), "2007/07-02.grib");
}

#[test]
fn test_config_from_path_parses_full_key_set() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config"),
        "type = ondisk2\n\
         format = grib\n\
         step = daily\n\
         unique = origin, product, level, timerange, reftime\n\
         index = origin, product\n\
         replace = yes\n\
         archive age = 365\n\
         delete age = 730\n\
         restrict = ds-rw\n",
    )
    .unwrap();

    let config = Config::from_path(dir.path()).unwrap();
    assert_eq!(config.kind, Kind::OnDisk2);
    assert_eq!(config.format, DataFormat::Grib);
    assert_eq!(config.step, Step::Daily);
    assert_eq!(config.unique_fields.len(), 5);
    assert_eq!(config.indexed_fields, vec![Code::Origin, Code::Product]);
    assert_eq!(config.replace, ReplacePolicy::Replace);
    assert_eq!(config.archive_age_days, Some(365));
    assert_eq!(config.delete_age_days, Some(730));
    assert_eq!(config.restrict, vec!["ds-rw".to_string()]);
}

#[test]
fn test_config_from_path_rejects_missing_type() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config"), "format = grib\nstep = daily\n").unwrap();
    let err = Config::from_path(dir.path()).unwrap_err();
    assert_eq!(err.kind(), "Config");
}

#[test]
fn test_registry_from_path_parses_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("datasets.conf");
    std::fs::write(
        &path,
        "[obs]\n\
         type = ondisk2\n\
         format = bufr\n\
         step = monthly\n\
         \n\
         [forecasts]\n\
         type = simple\n\
         format = grib\n\
         step = yearly\n",
    )
    .unwrap();

    let registry = Registry::from_path(&path).unwrap();
    assert_eq!(registry.datasets.len(), 2);
    let obs = registry.get("obs").unwrap();
    assert_eq!(obs.kind, Kind::OnDisk2);
    assert_eq!(obs.path, dir.path().join("obs"));
    let forecasts = registry.get("forecasts").unwrap();
    assert_eq!(forecasts.kind, Kind::Simple);
}
