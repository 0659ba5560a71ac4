use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap};
use tetgeom::bridge::WriteOptions;
use tetgeom::config::{DensityConfig, SnapshotConfig, SnapshotFormat};
use tetgeom::db::{Category, Sense, TetHandle};
use tetgeom::derive::binning::{BinSlot, Binning, BinningConfig, LinearBinning, build_binning};
use tetgeom::derive::sorter::sort_elements;
use tetgeom::fem::generate::{box_mesh, promote_to_tet10};
use tetgeom::fem::{FieldSampler, LocalComm, SerialComm};
use tetgeom::geom::tetrahedron::tetrahedron_volume;
use tetgeom::io::read_snapshot;
use tetgeom::materials::MaterialPartition;
use tetgeom::{
    BoundaryCondition, BoundaryKind, DeriverConfig, FeMesh, FieldSystem, GeomError,
    GeometryDeriver, MaterialSpec, Point, Vector,
};

/// Per-volume description independent of surface ids:
/// group name, temperature and the (facets, sense, parents) of each surface.
type Signature = Vec<(String, Option<i64>, Vec<(usize, i32, usize)>)>;

fn signature(deriver: &GeometryDeriver) -> Signature {
    let db = deriver.db();
    let mut out: Signature = deriver
        .topology()
        .volumes()
        .iter()
        .map(|&vol| {
            let group = db
                .set(vol)
                .unwrap()
                .parents()
                .iter()
                .find_map(|&p| {
                    let set = db.set(p).unwrap();
                    (set.category() == Category::Group).then(|| set.name().unwrap().to_string())
                })
                .unwrap();
            let temperature = deriver
                .volume_info(vol)
                .unwrap()
                .temperature
                .map(|t| (t * 1000.).round() as i64);
            let mut surfaces: Vec<_> = db
                .volume_surfaces(vol)
                .unwrap()
                .into_iter()
                .map(|(s, sense)| {
                    let set = db.set(s).unwrap();
                    (set.triangles().len(), sense.value(), set.parents().len())
                })
                .collect();
            surfaces.sort();
            (group, temperature, surfaces)
        })
        .collect();
    out.sort();
    out
}

fn cube(n: usize) -> FeMesh {
    box_mesh(Point::new(0., 0., 0.), Point::new(1., 1., 1.), [n; 3], |_| 1).unwrap()
}

fn single_material() -> DeriverConfig {
    let mut config = DeriverConfig::new();
    config.materials = vec![MaterialSpec::new("steel", &[1])];
    config
}

fn temperature_field(mesh: &FeMesh, f: impl Fn(Point) -> f64) -> FieldSystem {
    let mut fields = FieldSystem::new(mesh.n_elements());
    fields.add_variable("temperature");
    fields
        .fill("temperature", |e| f(mesh.centroid(e).unwrap()))
        .unwrap();
    fields
}

fn derive(mesh: &FeMesh, fields: &FieldSystem, config: DeriverConfig) -> GeometryDeriver {
    let mut deriver = GeometryDeriver::new(config).unwrap();
    deriver.init(mesh).unwrap();
    deriver.update(mesh, fields, &SerialComm).unwrap();
    deriver
}

#[test]
fn test_single_material_cube() {
    let mesh = cube(3);
    let fields = temperature_field(&mesh, |_| 300.);
    let deriver = derive(&mesh, &fields, single_material());

    assert_eq!(deriver.topology().volumes().len(), 2);
    assert_eq!(deriver.topology().surfaces().len(), 3);

    let steel = deriver.db().find_set(Category::Volume, 1).unwrap();
    let surfaces = deriver.db().volume_surfaces(steel).unwrap();
    assert_eq!(surfaces.len(), 1);
    assert_eq!(surfaces[0].1, Sense::Forward);
    // 6 faces of 3x3 quads, two facets each
    assert_eq!(deriver.db().set(surfaces[0].0).unwrap().triangles().len(), 6 * 9 * 2);
    assert!((deriver.db().surface_area(surfaces[0].0).unwrap() - 6.).abs() < 1e-9);
}

#[test]
fn test_inclusion_in_second_material() {
    let mesh = box_mesh(Point::new(0., 0., 0.), Point::new(3., 3., 3.), [3, 3, 3], |c| {
        let inside = [c.x, c.y, c.z].iter().all(|v| (1. ..2.).contains(v));
        if inside { 2 } else { 1 }
    })
    .unwrap();
    let mut config = DeriverConfig::new();
    config.materials = vec![
        MaterialSpec::new("air", &[1]),
        MaterialSpec::new("copper", &[2]),
    ];
    let fields = temperature_field(&mesh, |_| 400.);
    let deriver = derive(&mesh, &fields, config);

    assert_eq!(deriver.topology().volumes().len(), 3);
    assert_eq!(deriver.topology().surfaces().len(), 4);

    let db = deriver.db();
    let shared: Vec<_> = deriver
        .topology()
        .surfaces()
        .iter()
        .filter(|&&s| db.set(s).unwrap().parents().len() == 2)
        .collect();
    assert_eq!(shared.len(), 1);
    let senses = db.set(*shared[0]).unwrap().senses().to_vec();
    assert_ne!(senses[0].1, senses[1].1);
    assert_eq!(db.set(*shared[0]).unwrap().triangles().len(), 12);

    let names: BTreeSet<_> = deriver
        .topology()
        .groups()
        .iter()
        .map(|&g| db.set(g).unwrap().name().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        BTreeSet::from(["mat:air".into(), "mat:copper".into(), "mat:Graveyard".into()])
    );
    let graveyard_group = db.find_set(Category::Group, 3).unwrap();
    assert_eq!(db.set(graveyard_group).unwrap().name(), Some("mat:Graveyard"));
}

#[test]
fn test_hot_core_adds_nested_volume() {
    let mesh = box_mesh(Point::new(-2., -2., -2.), Point::new(2., 2., 2.), [4, 4, 4], |_| 1).unwrap();
    let radial = |p: Point| {
        let r = Vector::from_points(Point::origin(), p).length();
        if r < 1. { 305. } else { 300. }
    };

    let uniform = derive(&mesh, &temperature_field(&mesh, |_| 300.), single_material());
    let deriver = derive(&mesh, &temperature_field(&mesh, radial), single_material());

    assert_eq!(
        deriver.topology().volumes().len(),
        uniform.topology().volumes().len() + 1
    );
    assert_eq!(
        deriver.topology().surfaces().len(),
        uniform.topology().surfaces().len() + 1
    );

    let temperatures: Vec<f64> = deriver
        .topology()
        .volumes()
        .iter()
        .filter_map(|&v| deriver.temperature(v).ok())
        .collect();
    assert_eq!(temperatures.len(), 2);
    assert!(temperatures.iter().any(|t| (t - 305.).abs() < 1e-9));
    assert!(temperatures.iter().any(|t| (t - 300.).abs() < 1e-9));

    // The hot core is bounded by one surface only, shared with the shell
    let db = deriver.db();
    let core = deriver
        .topology()
        .volumes()
        .iter()
        .copied()
        .find(|&v| deriver.temperature(v).is_ok_and(|t| t > 302.))
        .unwrap();
    let surfaces = db.volume_surfaces(core).unwrap();
    assert_eq!(surfaces.len(), 1);
    assert_eq!(db.set(surfaces[0].0).unwrap().parents().len(), 2);
}

fn density_config() -> DeriverConfig {
    let mut config = DeriverConfig::new();
    config.materials = vec![MaterialSpec::new("steel", &[1]).with_density(8.)];
    config.density = Some(DensityConfig {
        variable: "density".into(),
        range: 0.1,
        n_bins: 2,
    });
    config
}

fn density_fields(mesh: &FeMesh, rho: impl Fn(usize) -> f64) -> FieldSystem {
    let mut fields = temperature_field(mesh, |_| 300.);
    fields.add_variable("density");
    fields.fill("density", rho).unwrap();
    fields
}

#[test]
fn test_density_out_of_range_fails_update() {
    let mesh = cube(2);
    let fields = density_fields(&mesh, |e| if e == 5 { 8. * 1.12 } else { 8. });
    let mut deriver = GeometryDeriver::new(density_config()).unwrap();
    deriver.init(&mesh).unwrap();
    let err = deriver.update(&mesh, &fields, &SerialComm);
    assert!(matches!(err, Err(GeomError::DensityOutOfRange { elem: 5, .. })));
    assert!(!deriver.is_valid());
}

#[test]
fn test_density_out_of_range_fails_every_rank() {
    let mut mesh = cube(2);
    mesh.partition(2);
    let fields = density_fields(&mesh, |e| if e == 0 { 8. * 0.85 } else { 8. });
    let failed = LocalComm::run(2, |comm| {
        let mut deriver = GeometryDeriver::new(density_config()).unwrap();
        deriver.init(&mesh).unwrap();
        deriver.update(&mesh, &fields, &comm).is_err()
    });
    assert_eq!(failed, vec![true, true]);
}

#[test]
fn test_density_bins_split_groups() {
    let mesh = box_mesh(Point::new(0., 0., 0.), Point::new(2., 1., 1.), [2, 1, 1], |_| 1).unwrap();
    let fields = density_fields(&mesh, |e| {
        if mesh.centroid(e).unwrap().x < 1. { 8. * 0.95 } else { 8. * 1.05 }
    });
    let deriver = derive(&mesh, &fields, density_config());

    let db = deriver.db();
    let light = db.find_set(Category::Group, 1).unwrap();
    let heavy = db.find_set(Category::Group, 2).unwrap();
    assert_eq!(db.set(light).unwrap().name(), Some("mat:steel_0"));
    assert_eq!(db.set(heavy).unwrap().name(), Some("mat:steel_1"));
    let graveyard = db.find_set(Category::Group, 3).unwrap();
    assert_eq!(db.set(graveyard).unwrap().name(), Some("mat:Graveyard"));

    let vol = db.set(light).unwrap().children()[0];
    let info = deriver.volume_info(vol).unwrap();
    assert!((info.density.unwrap() - 8. * 0.95).abs() < 1e-9);
}

#[test]
fn test_log_midpoints_map_back() {
    let binning = build_binning(&BinningConfig::log(1., 1000., 12)).unwrap();
    for i in 0..binning.n_bins() {
        assert_eq!(binning.slot(binning.midpoint(i)), BinSlot::Bin(i));
    }

    let mut config = single_material();
    config.temperature_bins = BinningConfig::log(100., 1000., 10);
    let midpoint = build_binning(&config.temperature_bins).unwrap().midpoint(3);
    let mesh = cube(2);
    let deriver = derive(&mesh, &temperature_field(&mesh, |_| midpoint), config);
    let vol = deriver.db().find_set(Category::Volume, 1).unwrap();
    assert!((deriver.temperature(vol).unwrap() - midpoint).abs() < 1e-9 * midpoint);
}

#[test]
fn test_repeated_update_is_stable() {
    let mesh = box_mesh(Point::new(0., 0., 0.), Point::new(3., 3., 3.), [3, 3, 3], |c| {
        if c.z < 1. { 2 } else { 1 }
    })
    .unwrap();
    let mut config = single_material();
    config.materials = vec![
        MaterialSpec::new("steel", &[1]),
        MaterialSpec::new("lead", &[2]),
    ];
    let fields = temperature_field(&mesh, |p| 300. + 10. * p.x);

    let mut deriver = GeometryDeriver::new(config).unwrap();
    deriver.init(&mesh).unwrap();
    let first = deriver.update(&mesh, &fields, &SerialComm).unwrap();
    let sig = signature(&deriver);
    let second = deriver.update(&mesh, &fields, &SerialComm).unwrap();

    assert_eq!(first, second);
    assert_eq!(signature(&deriver), sig);
}

#[test]
fn test_bins_partition_elements() {
    let mesh = box_mesh(Point::new(0., 0., 0.), Point::new(4., 2., 2.), [4, 2, 2], |c| {
        if c.x < 2. { 1 } else { 2 }
    })
    .unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut fields = FieldSystem::new(mesh.n_elements());
    fields.add_variable("temperature");
    let values: Vec<f64> = (0..mesh.n_elements())
        .map(|_| rng.random_range(200.0..700.0))
        .collect();
    fields.fill("temperature", |e| values[e]).unwrap();

    let mats = [MaterialSpec::new("a", &[1]), MaterialSpec::new("b", &[2])];
    let partition = MaterialPartition::new(&mats, &mesh.blocks()).unwrap();
    let sampler = FieldSampler::new(&mesh, &fields, "temperature", 1e-9).unwrap();
    let bins = LinearBinning::new(297.5, 597.5, 60).unwrap();
    let sorted = sort_elements(&mesh, &SerialComm, &partition, &sampler, &bins, None).unwrap();

    let mut all = BTreeSet::new();
    let mut total = 0;
    for set in sorted.bins.iter().chain([&sorted.underflow, &sorted.overflow]) {
        total += set.len();
        all.extend(set.iter().copied());
    }
    assert_eq!(total, mesh.n_elements());
    assert_eq!(all, (0..mesh.n_elements()).collect());
    assert!(!sorted.underflow.is_empty());
    assert!(!sorted.overflow.is_empty());
}

#[test]
fn test_ranks_agree_with_serial() {
    let mut mesh = box_mesh(Point::new(0., 0., 0.), Point::new(3., 2., 2.), [3, 2, 2], |_| 1).unwrap();
    let fields = temperature_field(&mesh, |p| if p.x > 1.5 { 320. } else { 300. });
    let serial = signature(&derive(&mesh, &fields, single_material()));

    mesh.partition(3);
    let per_rank = LocalComm::run(3, |comm| {
        let mut deriver = GeometryDeriver::new(single_material()).unwrap();
        deriver.init(&mesh).unwrap();
        deriver.update(&mesh, &fields, &comm).unwrap();
        (signature(&deriver), deriver.db().n_triangles())
    });
    for (sig, n_triangles) in &per_rank {
        assert_eq!(sig, &serial);
        assert_eq!(*n_triangles, per_rank[0].1);
    }
}

fn constant_density_results(deriver: &GeometryDeriver, v: f64) -> Vec<f64> {
    let handles = deriver.handles();
    let offset = handles.offset().map_or(0, |h| h.index());
    (0..handles.n_tets())
        .map(|i| {
            let [a, b, c, d] = deriver.db().tet_points(TetHandle(offset + i));
            v * tetrahedron_volume(a, b, c, d)
        })
        .collect()
}

#[test]
fn test_write_then_read_back() {
    for mesh in [cube(2), promote_to_tet10(&cube(2)).unwrap()] {
        let mut fields = temperature_field(&mesh, |_| 300.);
        fields.add_variable("heating");
        let deriver = derive(&mesh, &fields, single_material());

        let results = constant_density_results(&deriver, 2.5);
        let opts = WriteOptions {
            normalize_by_volume: true,
            ..WriteOptions::default()
        };
        let written = deriver
            .set_solution(&mesh, &mut fields, &SerialComm, "heating", &results, opts)
            .unwrap();
        assert!(written);

        let sampler = FieldSampler::new(&mesh, &fields, "heating", 1e-9).unwrap();
        for e in 0..mesh.n_elements() {
            assert!((sampler.element_value(e).unwrap() - 2.5).abs() < 1e-9);
        }
    }
}

#[test]
fn test_ranks_write_own_elements() {
    let mut mesh = box_mesh(Point::new(0., 0., 0.), Point::new(2., 1., 1.), [2, 1, 1], |_| 1).unwrap();
    mesh.partition(2);
    let owned: Vec<BTreeSet<usize>> = (0..2).map(|r| mesh.local_elements(r).collect()).collect();

    let per_rank = LocalComm::run(2, |comm| {
        let mut fields = temperature_field(&mesh, |_| 300.);
        fields.add_variable("heating");
        let mut deriver = GeometryDeriver::new(single_material()).unwrap();
        deriver.init(&mesh).unwrap();
        deriver.update(&mesh, &fields, &comm).unwrap();
        let opts = WriteOptions {
            normalize_by_volume: true,
            ..WriteOptions::default()
        };

        let results = constant_density_results(&deriver, 2.5);
        let written = deriver
            .set_solution(&mesh, &mut fields, &comm, "heating", &results, opts)
            .unwrap();
        let heating = fields.values("heating").unwrap();

        // Zero everywhere on every rank still completes on all of them
        let zeros = vec![0.; results.len()];
        let zero_written = deriver
            .set_solution(&mesh, &mut fields, &comm, "heating", &zeros, opts)
            .unwrap();
        (written, heating, zero_written, fields.values("heating").unwrap())
    });

    for (rank, (written, heating, zero_written, zeroed)) in per_rank.iter().enumerate() {
        assert!(*written);
        assert!(*zero_written);
        for (e, &v) in heating.iter().enumerate() {
            let expected = if owned[rank].contains(&e) { 2.5 } else { 0. };
            assert!((v - expected).abs() < 1e-9, "rank {rank} element {e}: {v}");
        }
        assert!(zeroed.iter().all(|&v| v == 0.));
    }
}

#[test]
fn test_write_errors() {
    let mesh = cube(1);
    let mut fields = temperature_field(&mesh, |_| 300.);
    fields.add_variable("flux");
    let deriver = derive(&mesh, &fields, single_material());
    let n = deriver.handles().n_tets();
    let opts = WriteOptions::default();

    let unknown = deriver.set_solution(&mesh, &mut fields, &SerialComm, "nope", &vec![1.; n], opts);
    assert!(matches!(unknown, Err(GeomError::UnknownVariable(_))));

    let empty = deriver.set_solution(&mesh, &mut fields, &SerialComm, "flux", &[], opts);
    assert!(!empty.unwrap());

    let short = deriver.set_solution(&mesh, &mut fields, &SerialComm, "flux", &[1.], opts);
    assert!(matches!(
        short,
        Err(GeomError::ResultSizeMismatch { expected, got: 1 }) if expected == n
    ));
}

#[test]
fn test_second_order_mesh() {
    let linear = cube(2);
    let quadratic = promote_to_tet10(&linear).unwrap();
    let fields_l = temperature_field(&linear, |_| 300.);
    let fields_q = temperature_field(&quadratic, |_| 300.);

    let dl = derive(&linear, &fields_l, single_material());
    let dq = derive(&quadratic, &fields_q, single_material());

    assert_eq!(dq.handles().n_tets(), 8 * quadratic.n_elements());
    assert_eq!(dq.topology().volumes().len(), dl.topology().volumes().len());
    assert_eq!(dq.topology().surfaces().len(), dl.topology().surfaces().len());

    // Every boundary facet splits in four
    let skin = |d: &GeometryDeriver| {
        let vol = d.db().find_set(Category::Volume, 1).unwrap();
        let (surf, _) = d.db().volume_surfaces(vol).unwrap()[0];
        d.db().set(surf).unwrap().triangles().len()
    };
    assert_eq!(skin(&dq), 4 * skin(&dl));

    let mut fields_q = fields_q;
    fields_q.add_variable("err");
    let ones = vec![1.; dq.handles().n_tets()];
    let opts = WriteOptions {
        is_error: true,
        ..WriteOptions::default()
    };
    dq.set_solution(&quadratic, &mut fields_q, &SerialComm, "err", &ones, opts)
        .unwrap();
    let err = fields_q.values("err").unwrap();
    assert!(err.iter().all(|v| (v - 8f64.sqrt()).abs() < 1e-12));
}

#[test]
fn test_length_scale_and_displacement() {
    let mut mesh = cube(2);
    let mut config = single_material();
    config.length_scale = 100.;
    let fields = temperature_field(&mesh, |_| 300.);

    let mut deriver = GeometryDeriver::new(config).unwrap();
    deriver.init(&mesh).unwrap();
    deriver.update(&mesh, &fields, &SerialComm).unwrap();
    let bbox = deriver.bounding_box().unwrap();
    assert!(bbox.max.is_close(&Point::new(100., 100., 100.)));

    // Stretch along x by 10%
    let displacement = (0..mesh.n_nodes())
        .map(|i| Vector::new(0.1 * mesh.reference_node(i).x, 0., 0.))
        .collect();
    mesh.set_displacement(displacement).unwrap();
    deriver.update(&mesh, &fields, &SerialComm).unwrap();
    let bbox = deriver.bounding_box().unwrap();
    assert!(bbox.max.is_close_tol(&Point::new(110., 100., 100.), 1e-9));

    let vol = deriver.db().find_set(Category::Volume, 1).unwrap();
    let (surf, _) = deriver.db().volume_surfaces(vol).unwrap()[0];
    let area = deriver.db().surface_area(surf).unwrap();
    let expected = 2. * (110. * 100.) * 2. + 2. * (100. * 100.);
    assert!((area - expected).abs() < 1e-6 * expected);
}

#[test]
fn test_boundary_groups() {
    let mut mesh = cube(2);
    mesh.add_side_set("outer", mesh.exterior_sides()).unwrap();
    let mut config = single_material();
    config.boundary_conditions = vec![
        BoundaryCondition::new(BoundaryKind::Reflecting, &["outer"]),
        BoundaryCondition::new(BoundaryKind::Graveyard, &["outer"]),
    ];
    let fields = temperature_field(&mesh, |_| 300.);
    let deriver = derive(&mesh, &fields, config);

    let db = deriver.db();
    let group = db.find_set(Category::Group, 3).unwrap();
    assert_eq!(db.set(group).unwrap().name(), Some("boundary:Reflecting"));
    let vol = db.find_set(Category::Volume, 1).unwrap();
    let (skin, _) = db.volume_surfaces(vol).unwrap()[0];
    assert_eq!(db.set(group).unwrap().children(), [skin]);
    assert_eq!(deriver.topology().groups().len(), 3);
}

#[test]
fn test_periodic_boundary_rejected() {
    let mut config = single_material();
    config.boundary_conditions = vec![BoundaryCondition::new(BoundaryKind::Periodic, &["x"])];
    assert!(matches!(
        GeometryDeriver::new(config),
        Err(GeomError::UnsupportedBoundary(_))
    ));
}

#[test]
fn test_snapshots_written_on_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = single_material();
    config.snapshots = SnapshotConfig {
        enabled: true,
        output_base: dir.path().join("surfs").display().to_string(),
        n_output: 2,
        n_skip: 0,
        format: SnapshotFormat::Json,
    };
    let mesh = cube(2);
    let fields = temperature_field(&mesh, |_| 300.);
    let mut deriver = GeometryDeriver::new(config).unwrap();
    deriver.init(&mesh).unwrap();
    for _ in 0..3 {
        deriver.update(&mesh, &fields, &SerialComm).unwrap();
    }

    assert!(!dir.path().join("surfs_2.json").exists());
    let db = read_snapshot(&dir.path().join("surfs_1.json")).unwrap();
    assert_eq!(db.sets(Category::Volume).len(), 2);
    assert_eq!(db.sets(Category::Surface).len(), 3);
    assert_eq!(db.n_triangles(), deriver.db().n_triangles());
    assert!((db.faceting_tol() - 1e-4).abs() < 1e-15);
}

#[test]
fn test_material_ids_by_density() {
    let mesh = cube(2);
    let fields = density_fields(&mesh, |_| 8. * 1.05);
    let deriver = derive(&mesh, &fields, density_config());

    let vol = deriver.db().find_set(Category::Volume, 1).unwrap();
    let density = deriver.volume_info(vol).unwrap().density.unwrap();
    let library = tetgeom::MaterialLibrary::Structured(HashMap::from([
        (tetgeom::MaterialLibrary::structured_key("steel", density), 11),
        ("steel".to_string(), 10),
    ]));
    assert_eq!(deriver.material_id(vol, &library).unwrap(), 11);
}
